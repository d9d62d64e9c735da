//! Index enumeration: `ip_search_result` → remote `_stats` → `es_indexes`.
//!
//! One unit of work per known host. A host that cannot be reached, or
//! answers with garbage, is logged and contributes no rows; the other hosts
//! are unaffected. All rows are written in a single batch at the end.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::exclusion::ExclusionFilter;
use crate::models::{now_timestamp, IndexRecord, IndexStats};
use crate::progress::StageProgress;
use crate::store::Store;
use crate::traits::StoreConnector;
use crate::units::format_si_bytes;
use crate::workers::run_bounded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub hosts: usize,
    pub failed_hosts: usize,
    pub indexes: usize,
}

pub async fn run_scrape(
    store: &Store,
    connector: Arc<dyn StoreConnector>,
    filter: Arc<ExclusionFilter>,
    workers: usize,
) -> Result<ScrapeReport> {
    let hosts = store.host_addresses().await?;
    let host_count = hosts.len();
    let progress = StageProgress::stderr("scrape", host_count as u64);

    let outcomes = run_bounded(workers, hosts, &progress, move |(ip, port): (String, i64)| {
        let connector = Arc::clone(&connector);
        let filter = Arc::clone(&filter);
        async move { scrape_host(connector.as_ref(), &filter, &ip, port).await }
    })
    .await;

    let mut rows = Vec::new();
    let mut failed_hosts = 0;
    for outcome in outcomes {
        let (ip, port) = outcome.unit;
        match outcome.result {
            Ok(host_rows) => rows.extend(host_rows),
            Err(e) => {
                failed_hosts += 1;
                warn!("Exception connecting to {}:{}: {:#}", ip, port, e);
            }
        }
    }

    store.upsert_indexes(&rows).await?;

    Ok(ScrapeReport {
        hosts: host_count,
        failed_hosts,
        indexes: rows.len(),
    })
}

/// Enumerate the indices of a single host.
pub async fn scrape_host(
    connector: &dyn StoreConnector,
    filter: &ExclusionFilter,
    ip: &str,
    port: i64,
) -> Result<Vec<IndexRecord>> {
    info!("Scraping {}:{}", ip, port);
    let remote = connector.connect(ip, port)?;
    let indices = remote.index_stats().await?;

    if indices.is_empty() {
        info!("No indexes for {}:{}", ip, port);
        return Ok(Vec::new());
    }

    let updated_date = now_timestamp();
    let rows: Vec<IndexRecord> = indices
        .into_iter()
        .filter(|(name, _)| !filter.is_excluded(name))
        .map(|(name, stats)| to_record(ip, port, name, stats, &updated_date))
        .collect();

    info!("Scraped {} indexes from {}:{}", rows.len(), ip, port);
    Ok(rows)
}

fn to_record(ip: &str, port: i64, name: String, stats: IndexStats, updated_date: &str) -> IndexRecord {
    IndexRecord {
        ip_address: ip.to_string(),
        port,
        uuid: stats
            .uuid
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| name.clone()),
        index_name: name,
        docs_count: clamp_i64(stats.docs_count),
        docs_deleted: clamp_i64(stats.docs_deleted),
        store_size: format_si_bytes(stats.store_size_bytes),
        store_size_bytes: clamp_i64(stats.store_size_bytes),
        updated_date: updated_date.to_string(),
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
