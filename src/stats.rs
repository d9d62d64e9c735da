//! Database overview.
//!
//! Summarizes what has been collected so far: host, index and sample
//! counts, plus a per-host table. Used by `escout stats` to check progress
//! between pipeline stages.

use anyhow::Result;
use std::path::Path;

use crate::store::Store;
use crate::units::format_si_bytes;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(store: &Store, db_path: &Path) -> Result<()> {
    let hosts = store.host_count().await?;
    let indexes = store.index_count().await?;
    let samples = store.sample_count().await?;

    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("elastic-scout — Database Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_si_bytes(db_size));
    println!();
    println!("  Hosts:       {}", hosts);
    println!("  Indexes:     {}", indexes);
    println!("  Samples:     {}", samples);

    let summaries = store.host_summaries().await?;
    if !summaries.is_empty() {
        println!();
        println!("  By host:");
        println!(
            "  {:<24} {:<28} {:>8} {:>12} {:>8}",
            "HOST", "ORGANIZATION", "INDEXES", "DOCS", "SAMPLES"
        );
        println!("  {}", "-".repeat(84));

        for s in &summaries {
            let host = format!("{}:{}", s.ip_address, s.port);
            let org = truncate(s.organization.as_deref().unwrap_or("-"), 28);
            println!(
                "  {:<24} {:<28} {:>8} {:>12} {:>8}",
                host, org, s.index_count, s.docs_count, s.sample_count
            );
        }
    }

    println!();
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_long_org() {
        assert_eq!(truncate("short", 28), "short");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
