//! Document sampling: `es_indexes` → remote `_search` → `es_samples`.
//!
//! One unit of work per non-empty index. Unlike scraping, each unit writes
//! its own rows straight to the database, so concurrent units contend for
//! the SQLite write lock; [`Store::upsert_samples`] retries on contention.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db;
use crate::models::{now_timestamp, SampleRecord, SampleTarget};
use crate::progress::StageProgress;
use crate::store::Store;
use crate::traits::StoreConnector;
use crate::workers::run_bounded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub indexes: usize,
    pub failed: usize,
    pub samples: usize,
}

pub async fn run_sample(
    store: &Store,
    connector: Arc<dyn StoreConnector>,
    count: u32,
    workers: usize,
) -> Result<SampleReport> {
    let targets = store.sample_targets().await?;
    let index_count = targets.len();
    let progress = StageProgress::stderr("sample", index_count as u64);

    let writer = store.clone();
    let outcomes = run_bounded(workers, targets, &progress, move |target: SampleTarget| {
        let connector = Arc::clone(&connector);
        let store = writer.clone();
        async move { sample_index(&store, connector.as_ref(), &target, count).await }
    })
    .await;

    let mut failed = 0;
    let mut samples = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(n) => samples += n,
            Err(e) => {
                failed += 1;
                warn!("{}", failure_message(&outcome.unit, &e));
            }
        }
    }

    Ok(SampleReport {
        indexes: index_count,
        failed,
        samples,
    })
}

/// Fetch up to `count` documents from one index and store them.
/// Returns the number of samples written.
pub async fn sample_index(
    store: &Store,
    connector: &dyn StoreConnector,
    target: &SampleTarget,
    count: u32,
) -> Result<usize> {
    debug!(
        "Sampling {} on {}:{}",
        target.index_name, target.ip_address, target.port
    );
    let remote = connector.connect(&target.ip_address, target.port)?;
    let hits = remote.search(&target.index_name, count).await?;
    if hits.is_empty() {
        return Ok(0);
    }

    let rows = hits
        .iter()
        .map(|hit| to_record(target, hit))
        .collect::<Result<Vec<_>>>()?;

    store.upsert_samples(&rows).await?;
    info!(
        "Sampled {} documents from {}:{}/{}",
        rows.len(),
        target.ip_address,
        target.port,
        target.index_name
    );
    Ok(rows.len())
}

/// Log line for a failed unit. Lock contention that outlived the retries is
/// a local storage problem and is not reported as a connection failure.
pub fn failure_message(target: &SampleTarget, err: &anyhow::Error) -> String {
    if db::is_busy(err) {
        format!(
            "Database locked while storing samples from {}:{}/{}: {:#}",
            target.ip_address, target.port, target.index_name, err
        )
    } else {
        format!(
            "Exception connecting to {}:{} (index {}): {:#}",
            target.ip_address, target.port, target.index_name, err
        )
    }
}

fn to_record(target: &SampleTarget, hit: &Value) -> Result<SampleRecord> {
    let document_id = match hit.get("_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => anyhow::bail!("search hit without _id"),
        Some(other) => other.to_string(),
    };
    Ok(SampleRecord {
        document_id,
        uuid: target.uuid.clone(),
        ip_address: target.ip_address.clone(),
        port: target.port,
        index_name: target.index_name.clone(),
        sample: serde_json::to_string_pretty(hit)?,
        updated_date: now_timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> SampleTarget {
        SampleTarget {
            uuid: "u1".to_string(),
            ip_address: "192.0.2.1".to_string(),
            port: 9200,
            index_name: "users".to_string(),
        }
    }

    #[test]
    fn record_keeps_full_hit() {
        let hit = json!({"_index": "users", "_id": "42", "_source": {"email": "a@example.com"}});
        let row = to_record(&target(), &hit).unwrap();
        assert_eq!(row.document_id, "42");
        assert_eq!(row.uuid, "u1");
        let parsed: Value = serde_json::from_str(&row.sample).unwrap();
        assert_eq!(parsed, hit);
        assert!(row.sample.contains('\n'), "sample should be pretty-printed");
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let row = to_record(&target(), &json!({"_id": 7})).unwrap();
        assert_eq!(row.document_id, "7");
    }

    #[test]
    fn network_failure_message() {
        let err = anyhow::anyhow!("connection refused");
        let msg = failure_message(&target(), &err);
        assert!(msg.starts_with("Exception connecting to 192.0.2.1:9200"));
        assert!(msg.contains("users"));
    }

    #[test]
    fn hit_without_id_is_rejected() {
        assert!(to_record(&target(), &json!({"_source": {}})).is_err());
    }
}
