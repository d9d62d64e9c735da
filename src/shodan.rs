//! Shodan host-search client.
//!
//! Talks to the Shodan REST API directly:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`HostSearch::count`] | `GET /shodan/host/count?key=…&query=…` |
//! | [`HostSearch::search_page`] | `GET /shodan/host/search?key=…&query=…&page=N&minify=true` |
//!
//! [`SearchCursor`] walks the pages lazily, one request per page, until it
//! has seen as many hits as the reported `total` or the API returns an
//! empty page. A page that fails is retried after a one
//! second pause, up to `search.page_retries` times, before the error is
//! surfaced to the caller.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::models::{HostHit, SearchPage};
use crate::traits::HostSearch;

/// Shodan API client bound to one API key.
pub struct ShodanClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ShodanClient {
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .with_context(|| format!("Shodan request to {} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            bail!("Shodan API error {}: {}", status, message);
        }

        let parsed = response
            .json::<T>()
            .await
            .with_context(|| format!("invalid Shodan response from {}", path))?;
        Ok(parsed)
    }
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

#[derive(Deserialize)]
struct CountResponse {
    total: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    matches: Vec<Banner>,
    #[serde(default)]
    total: u64,
}

#[derive(Deserialize)]
struct Banner {
    ip_str: String,
    port: i64,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    location: Location,
}

#[derive(Deserialize, Default)]
struct Location {
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    country_code3: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl From<Banner> for HostHit {
    fn from(b: Banner) -> Self {
        HostHit {
            ip: b.ip_str,
            port: b.port,
            org: b.org,
            country_code: b.location.country_code,
            country_code3: b.location.country_code3,
            country_name: b.location.country_name,
            latitude: b.location.latitude,
            longitude: b.location.longitude,
        }
    }
}

#[async_trait]
impl HostSearch for ShodanClient {
    async fn count(&self, query: &str) -> Result<u64> {
        let resp: CountResponse = self
            .get("/shodan/host/count", &[("query", query.to_string())])
            .await?;
        Ok(resp.total)
    }

    async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage> {
        let resp: SearchResponse = self
            .get(
                "/shodan/host/search",
                &[
                    ("query", query.to_string()),
                    ("page", page.to_string()),
                    ("minify", "true".to_string()),
                ],
            )
            .await?;
        Ok(SearchPage {
            total: resp.total,
            hits: resp.matches.into_iter().map(HostHit::from).collect(),
        })
    }
}

/// Lazy, finite, single-pass iteration over every hit for a query.
pub struct SearchCursor<'a> {
    api: &'a dyn HostSearch,
    query: String,
    page: u32,
    retries: u32,
    retry_delay: Duration,
    buffer: std::vec::IntoIter<HostHit>,
    seen: u64,
    exhausted: bool,
}

impl<'a> SearchCursor<'a> {
    pub fn new(api: &'a dyn HostSearch, query: impl Into<String>, retries: u32) -> Self {
        Self {
            api,
            query: query.into(),
            page: 1,
            retries,
            retry_delay: Duration::from_secs(1),
            buffer: Vec::new().into_iter(),
            seen: 0,
            exhausted: false,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Next hit, fetching another page when the current one is used up.
    /// Returns `Ok(None)` once `total` hits have been handed out or the API
    /// hands back an empty page. Pages past the end are never requested.
    pub async fn next_hit(&mut self) -> Result<Option<HostHit>> {
        loop {
            if let Some(hit) = self.buffer.next() {
                return Ok(Some(hit));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self.fetch_page().await?;
            if page.hits.is_empty() {
                self.exhausted = true;
                return Ok(None);
            }
            debug!(
                page = self.page,
                hits = page.hits.len(),
                total = page.total,
                "fetched search page"
            );
            self.seen += page.hits.len() as u64;
            if page.total > 0 && self.seen >= page.total {
                self.exhausted = true;
            }
            self.buffer = page.hits.into_iter();
            self.page += 1;
        }
    }

    async fn fetch_page(&self) -> Result<SearchPage> {
        let mut tries = 0;
        loop {
            match self.api.search_page(&self.query, self.page).await {
                Ok(hits) => return Ok(hits),
                Err(e) if tries < self.retries => {
                    tries += 1;
                    warn!(page = self.page, tries, "search page failed, retrying: {}", e);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "search page {} failed after {} retries",
                        self.page, tries
                    )))
                }
            }
        }
    }
}
