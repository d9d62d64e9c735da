//! Row types for the three relations, plus the remote-side records that
//! flow into them.
//!
//! Timestamps are stored as `%Y-%m-%d %H:%M:%S` text in UTC, see [`timestamp`].

use chrono::{DateTime, Utc};

/// A host returned by the search API (`ip_search_result`).
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    pub ip_address: String,
    pub port: i64,
    pub organization: Option<String>,
    pub country_code: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub original_search_query: String,
    pub updated_date: String,
}

/// Per-index metadata scraped from a remote store (`es_indexes`).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub ip_address: String,
    pub port: i64,
    pub index_name: String,
    pub uuid: String,
    pub docs_count: i64,
    pub docs_deleted: i64,
    pub store_size: String,
    pub store_size_bytes: i64,
    pub updated_date: String,
}

/// A sampled document (`es_samples`).
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub document_id: String,
    pub uuid: String,
    pub ip_address: String,
    pub port: i64,
    pub index_name: String,
    pub sample: String,
    pub updated_date: String,
}

/// An index selected for sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTarget {
    pub uuid: String,
    pub ip_address: String,
    pub port: i64,
    pub index_name: String,
}

/// One hit from the host-search API, already flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct HostHit {
    pub ip: String,
    pub port: i64,
    pub org: Option<String>,
    pub country_code: Option<String>,
    pub country_code3: Option<String>,
    pub country_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One page of host-search results. `total` is the API's match count for
/// the whole query, repeated on every page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub total: u64,
    pub hits: Vec<HostHit>,
}

/// Statistics for one remote index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub uuid: Option<String>,
    pub docs_count: u64,
    pub docs_deleted: u64,
    pub store_size_bytes: u64,
}

/// Format a timestamp the way every `updated_date` column stores it.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}
