//! Seams to the remote systems the pipeline talks to.
//!
//! ```text
//!  HostSearch ──▶ ingest ──▶ ip_search_result
//!                               │
//!  StoreConnector ─▶ RemoteStore ─▶ scrape ──▶ es_indexes
//!                               │
//!                   RemoteStore ─▶ sample ──▶ es_samples
//! ```
//!
//! Production implementations live in [`crate::shodan`] and
//! [`crate::elastic`]; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{IndexStats, SearchPage};

/// A host-search service (Shodan or compatible).
#[async_trait]
pub trait HostSearch: Send + Sync {
    /// Total number of matches for `query`. Informational only.
    async fn count(&self, query: &str) -> Result<u64>;

    /// One page of results, 1-based. An empty page marks the end.
    async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage>;
}

/// A remote document store reachable at one `(ip, port)`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Statistics for every index on the server.
    async fn index_stats(&self) -> Result<Vec<(String, IndexStats)>>;

    /// Up to `size` raw hits from `index`, each carrying at least `_id`.
    async fn search(&self, index: &str, size: u32) -> Result<Vec<Value>>;
}

/// Opens [`RemoteStore`] handles. Shared by every worker in a stage.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, ip: &str, port: i64) -> Result<Box<dyn RemoteStore>>;
}
