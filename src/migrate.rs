use anyhow::{bail, Result};
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

use crate::config::DbConfig;
use crate::db;

/// Schema scripts, applied in order.
const SCHEMA: [(&str, &str); 3] = [
    (
        "ip_search_result.sql",
        include_str!("../sql/ip_search_result.sql"),
    ),
    ("es_indexes.sql", include_str!("../sql/es_indexes.sql")),
    ("es_samples.sql", include_str!("../sql/es_samples.sql")),
];

/// Create a fresh database at `path` with all three relations.
///
/// Refuses to touch an existing file so that a typo never clobbers
/// collected results.
pub async fn create_database(path: &Path, config: &DbConfig) -> Result<()> {
    if path.exists() {
        bail!("Database file '{}' already exists.", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = db::connect_options(path, config)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let mut tx = pool.begin().await?;
    for (name, script) in SCHEMA {
        sqlx::raw_sql(script)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("failed to apply {}: {}", name, e))?;
    }
    tx.commit().await?;

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_all_tables() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.db");
        create_database(&path, &DbConfig::default()).await.unwrap();

        let pool = db::open(&path, &DbConfig::default()).await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["es_indexes", "es_samples", "ip_search_result"]);
    }

    #[tokio::test]
    async fn refuses_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.db");
        std::fs::write(&path, b"keep me").unwrap();

        let err = create_database(&path, &DbConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }
}
