//! Minimal Elasticsearch HTTP client.
//!
//! Only the two read-only endpoints the pipeline needs are implemented:
//!
//! - `GET /_all/_stats` for per-index document counts and store size.
//! - `GET /{index}/_search?size=N` for sample documents.
//!
//! Servers found through host search are usually unauthenticated, so no
//! credentials are sent. Connect and request timeouts come from the
//! `[elasticsearch]` config section.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ElasticsearchConfig;
use crate::models::IndexStats;
use crate::traits::{RemoteStore, StoreConnector};

/// Builds [`ElasticClient`]s that share one connection pool.
pub struct ElasticConnector {
    client: reqwest::Client,
    scheme: String,
}

impl ElasticConnector {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
        })
    }
}

impl StoreConnector for ElasticConnector {
    fn connect(&self, ip: &str, port: i64) -> Result<Box<dyn RemoteStore>> {
        let host = if ip.contains(':') {
            format!("[{}]", ip)
        } else {
            ip.to_string()
        };
        let base = Url::parse(&format!("{}://{}:{}/", self.scheme, host, port))
            .with_context(|| format!("invalid address {}:{}", ip, port))?;
        Ok(Box::new(ElasticClient {
            client: self.client.clone(),
            base,
        }))
    }
}

/// Client for a single Elasticsearch node.
pub struct ElasticClient {
    client: reqwest::Client,
    base: Url,
}

impl ElasticClient {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("base URL cannot carry a path: {}", self.base))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self.client.get(url.clone()).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", url.path(), status, truncate(&body, 200));
        }

        let parsed = response
            .json::<T>()
            .await
            .with_context(|| format!("invalid response from {}", url.path()))?;
        Ok(parsed)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(default)]
    indices: BTreeMap<String, IndexStatsEntry>,
}

#[derive(Deserialize)]
struct IndexStatsEntry {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    total: TotalStats,
}

#[derive(Deserialize, Default)]
struct TotalStats {
    #[serde(default)]
    docs: DocsStats,
    #[serde(default)]
    store: StoreStats,
}

#[derive(Deserialize, Default)]
struct DocsStats {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    deleted: u64,
}

#[derive(Deserialize, Default)]
struct StoreStats {
    #[serde(default)]
    size_in_bytes: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Hits,
}

#[derive(Deserialize, Default)]
struct Hits {
    #[serde(default)]
    hits: Vec<Value>,
}

#[async_trait]
impl RemoteStore for ElasticClient {
    async fn index_stats(&self) -> Result<Vec<(String, IndexStats)>> {
        let url = self.url(&["_all", "_stats"])?;
        let resp: StatsResponse = self.get_json(url, &[]).await?;

        Ok(resp
            .indices
            .into_iter()
            .map(|(name, entry)| {
                let stats = IndexStats {
                    uuid: entry.uuid,
                    docs_count: entry.total.docs.count,
                    docs_deleted: entry.total.docs.deleted,
                    store_size_bytes: entry.total.store.size_in_bytes,
                };
                (name, stats)
            })
            .collect())
    }

    async fn search(&self, index: &str, size: u32) -> Result<Vec<Value>> {
        let url = self.url(&[index, "_search"])?;
        let resp: SearchResponse = self.get_json(url, &[("size", size.to_string())]).await?;
        Ok(resp.hits.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ElasticClient {
        ElasticClient::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn parses_index_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_all/_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_shards": {"total": 2},
                "indices": {
                    "customers": {
                        "uuid": "abc123",
                        "total": {
                            "docs": {"count": 120, "deleted": 3},
                            "store": {"size_in_bytes": 2048000}
                        }
                    },
                    "legacy": {
                        "total": {
                            "docs": {"count": 0, "deleted": 0},
                            "store": {"size_in_bytes": 0}
                        }
                    }
                }
            })))
            .mount(&server)
            .await;

        let stats = client_for(&server).index_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        let (name, customers) = &stats[0];
        assert_eq!(name, "customers");
        assert_eq!(customers.uuid.as_deref(), Some("abc123"));
        assert_eq!(customers.docs_count, 120);
        assert_eq!(customers.docs_deleted, 3);
        assert_eq!(customers.store_size_bytes, 2_048_000);
        assert_eq!(stats[1].1.uuid, None);
    }

    #[tokio::test]
    async fn empty_stats_yield_no_indices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_all/_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indices": {}})))
            .mount(&server)
            .await;

        assert!(client_for(&server).index_stats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_returns_raw_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/_search"))
            .and(query_param("size", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": {"value": 120},
                    "hits": [
                        {"_index": "customers", "_id": "1", "_source": {"name": "a"}},
                        {"_index": "customers", "_id": "2", "_source": {"name": "b"}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let hits = client_for(&server).search("customers", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1]["_id"], "2");
        assert_eq!(hits[0]["_source"]["name"], "a");
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_all/_stats"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server).index_stats().await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn connector_builds_urls() {
        let connector = ElasticConnector::new(&ElasticsearchConfig::default()).unwrap();
        assert!(connector.connect("192.0.2.10", 9200).is_ok());
        assert!(connector.connect("2001:db8::1", 9200).is_ok());
    }

    #[test]
    fn index_names_are_escaped() {
        let client = ElasticClient::new(
            reqwest::Client::new(),
            Url::parse("http://192.0.2.10:9200/").unwrap(),
        );
        let url = client.url(&["logs 2024/01", "_search"]).unwrap();
        assert_eq!(url.path(), "/logs%202024%2F01/_search");
    }
}
