//! Host discovery: search API → `ip_search_result`.
//!
//! Drains every page of the search cursor into memory, then writes all
//! hosts in one upsert batch. A remote failure aborts the run before
//! anything is written.

use anyhow::{bail, Result};
use tracing::info;

use crate::config::SearchConfig;
use crate::models::{now_timestamp, HostHit, HostRecord};
use crate::shodan::SearchCursor;
use crate::store::Store;
use crate::traits::HostSearch;

/// Summary of one search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    pub query: String,
    pub total_reported: u64,
    pub fetched: usize,
    /// Row-count delta across the run. Replaced rows are not counted.
    pub new_hosts: i64,
}

/// Combine the fixed base filter with an optional keyword.
pub fn build_query(base_query: &str, keyword: Option<&str>) -> String {
    match keyword.map(str::trim).filter(|k| !k.is_empty()) {
        Some(k) => format!("{} {}", base_query, k),
        None => base_query.to_string(),
    }
}

/// Pick the API key: explicit flag, then config, then `SHODAN_API_KEY`.
pub fn resolve_api_key(flag: Option<String>, config: &SearchConfig) -> Result<String> {
    if let Some(key) = flag.or_else(|| config.api_key.clone()) {
        return Ok(key);
    }
    match std::env::var("SHODAN_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!(
            "No Shodan API key. Pass --api-key, set [search].api_key, or export SHODAN_API_KEY."
        ),
    }
}

fn to_record(hit: HostHit, query: &str, updated_date: String) -> HostRecord {
    let location = match (&hit.country_name, &hit.country_code) {
        (Some(name), Some(code)) => Some(format!("{} ({})", name, code)),
        (Some(name), None) => Some(name.clone()),
        (None, Some(code)) => Some(format!("({})", code)),
        (None, None) => None,
    };
    HostRecord {
        ip_address: hit.ip,
        port: hit.port,
        organization: hit.org,
        country_code: hit.country_code3,
        location,
        latitude: hit.latitude,
        longitude: hit.longitude,
        original_search_query: query.to_string(),
        updated_date,
    }
}

/// Run one search and persist every host it returns.
pub async fn run_search(
    store: &Store,
    api: &dyn HostSearch,
    keyword: Option<&str>,
    config: &SearchConfig,
) -> Result<SearchReport> {
    let query = build_query(&config.base_query, keyword);

    let total_reported = api.count(&query).await?;
    info!(
        "Total results for keyword \"{}\": {}",
        keyword.unwrap_or(""),
        total_reported
    );

    let existing = store.host_count().await?;

    let mut cursor = SearchCursor::new(api, query.clone(), config.page_retries);
    let mut records = Vec::new();
    while let Some(hit) = cursor.next_hit().await? {
        records.push(to_record(hit, &query, now_timestamp()));
    }

    store.upsert_hosts(&records).await?;

    let now = store.host_count().await?;
    Ok(SearchReport {
        query,
        total_reported,
        fetched: records.len(),
        new_hosts: now - existing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_and_without_keyword() {
        assert_eq!(build_query("product:elastic", None), "product:elastic");
        assert_eq!(build_query("product:elastic", Some("")), "product:elastic");
        assert_eq!(
            build_query("product:elastic", Some("acme")),
            "product:elastic acme"
        );
    }

    #[test]
    fn flag_wins_over_config() {
        let config = SearchConfig {
            api_key: Some("from-config".to_string()),
            ..SearchConfig::default()
        };
        assert_eq!(
            resolve_api_key(Some("from-flag".to_string()), &config).unwrap(),
            "from-flag"
        );
        assert_eq!(resolve_api_key(None, &config).unwrap(), "from-config");
    }

    #[test]
    fn record_location_label() {
        let hit = HostHit {
            ip: "192.0.2.1".to_string(),
            port: 9200,
            org: Some("Example".to_string()),
            country_code: Some("FR".to_string()),
            country_code3: Some("FRA".to_string()),
            country_name: Some("France".to_string()),
            latitude: Some(48.8),
            longitude: Some(2.3),
        };
        let record = to_record(hit, "product:elastic", "2024-01-01 00:00:00".to_string());
        assert_eq!(record.location.as_deref(), Some("France (FR)"));
        assert_eq!(record.country_code.as_deref(), Some("FRA"));
        assert_eq!(record.original_search_query, "product:elastic");
    }
}
