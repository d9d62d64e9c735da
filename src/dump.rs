//! Export collected samples as one JSON array.
//!
//! Each element looks like:
//!
//! ```json
//! { "host": "192.0.2.1", "port": 9200, "index": "users", "data": { "_id": "1", ... } }
//! ```
//!
//! The output goes to stdout so it can be piped into `jq` or a file;
//! progress logging stays on stderr.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

use crate::store::Store;

#[derive(Serialize)]
struct DumpEntry {
    host: String,
    port: i64,
    index: String,
    data: Value,
}

/// Write every stored sample to `out`. Returns the number of elements.
///
/// # Errors
///
/// A stored sample that is not valid JSON aborts the dump; that can only
/// happen if the database was edited by hand or is corrupt.
pub async fn write_dump<W: Write>(store: &Store, out: &mut W) -> Result<usize> {
    let samples = store.samples().await?;

    let entries = samples
        .into_iter()
        .map(|s| {
            let data: Value = serde_json::from_str(&s.sample).with_context(|| {
                format!(
                    "stored sample for {}:{}/{} is not valid JSON",
                    s.ip_address, s.port, s.index_name
                )
            })?;
            Ok(DumpEntry {
                host: s.ip_address,
                port: s.port,
                index: s.index_name,
                data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    serde_json::to_writer_pretty(&mut *out, &entries)?;
    writeln!(out)?;
    out.flush()?;
    Ok(entries.len())
}

/// CLI entry point: dump to stdout.
pub async fn run_dump(store: &Store) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_dump(store, &mut lock).await?;
    Ok(())
}
