//! Typed access to the three relations.
//!
//! Every write is an `INSERT ... ON CONFLICT DO UPDATE` keyed on the row's
//! natural identity, executed inside one transaction per batch and wrapped
//! in [`with_busy_retry`]. A batch either lands completely or not at all,
//! so retrying it can never produce duplicates.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::config::{Config, RetryConfig};
use crate::db::{self, with_busy_retry};
use crate::models::{HostRecord, IndexRecord, SampleRecord, SampleTarget};

/// Handle to an open database. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    retry: RetryConfig,
}

/// A stored sample joined with where it came from, as read by `dump`.
#[derive(Debug, Clone)]
pub struct StoredSample {
    pub ip_address: String,
    pub port: i64,
    pub index_name: String,
    pub sample: String,
}

/// Per-host totals for `stats`.
#[derive(Debug, Clone)]
pub struct HostSummary {
    pub ip_address: String,
    pub port: i64,
    pub organization: Option<String>,
    pub index_count: i64,
    pub docs_count: i64,
    pub sample_count: i64,
}

impl Store {
    pub fn new(pool: SqlitePool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    /// Open the database at `path` using the `[db]` and `[retry]` settings.
    pub async fn open(path: &Path, config: &Config) -> Result<Self> {
        let pool = db::open(path, &config.db).await?;
        Ok(Self::new(pool, config.retry.clone()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ── writes ───────────────────────────────────────────────────────

    pub async fn upsert_hosts(&self, rows: &[HostRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        with_busy_retry(&self.retry, "upsert ip_search_result", || {
            self.try_upsert_hosts(rows)
        })
        .await
    }

    async fn try_upsert_hosts(&self, rows: &[HostRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO ip_search_result (ip_address, port, organization, country_code,
                                              location, latitude, longitude,
                                              original_search_query, updated_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(ip_address, port) DO UPDATE SET
                    organization = excluded.organization,
                    country_code = excluded.country_code,
                    location = excluded.location,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    original_search_query = excluded.original_search_query,
                    updated_date = excluded.updated_date
                "#,
            )
            .bind(&row.ip_address)
            .bind(row.port)
            .bind(&row.organization)
            .bind(&row.country_code)
            .bind(&row.location)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(&row.original_search_query)
            .bind(&row.updated_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_indexes(&self, rows: &[IndexRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        with_busy_retry(&self.retry, "upsert es_indexes", || {
            self.try_upsert_indexes(rows)
        })
        .await
    }

    async fn try_upsert_indexes(&self, rows: &[IndexRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO es_indexes (ip_address, port, index_name, uuid, docs_count,
                                        docs_deleted, store_size, store_size_bytes, updated_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(ip_address, port, index_name) DO UPDATE SET
                    uuid = excluded.uuid,
                    docs_count = excluded.docs_count,
                    docs_deleted = excluded.docs_deleted,
                    store_size = excluded.store_size,
                    store_size_bytes = excluded.store_size_bytes,
                    updated_date = excluded.updated_date
                "#,
            )
            .bind(&row.ip_address)
            .bind(row.port)
            .bind(&row.index_name)
            .bind(&row.uuid)
            .bind(row.docs_count)
            .bind(row.docs_deleted)
            .bind(&row.store_size)
            .bind(row.store_size_bytes)
            .bind(&row.updated_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_samples(&self, rows: &[SampleRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        with_busy_retry(&self.retry, "upsert es_samples", || {
            self.try_upsert_samples(rows)
        })
        .await
    }

    async fn try_upsert_samples(&self, rows: &[SampleRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO es_samples (document_id, uuid, ip_address, port, index_name,
                                        sample, updated_date)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(document_id, uuid, ip_address, port, index_name) DO UPDATE SET
                    sample = excluded.sample,
                    updated_date = excluded.updated_date
                "#,
            )
            .bind(&row.document_id)
            .bind(&row.uuid)
            .bind(&row.ip_address)
            .bind(row.port)
            .bind(&row.index_name)
            .bind(&row.sample)
            .bind(&row.updated_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ── reads ────────────────────────────────────────────────────────

    pub async fn host_count(&self) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM ip_search_result")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn index_count(&self) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM es_indexes")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn sample_count(&self) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM es_samples")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Every known `(ip, port)` pair.
    pub async fn host_addresses(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT ip_address, port FROM ip_search_result")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("ip_address"), row.get("port")))
            .collect())
    }

    pub async fn hosts(&self) -> Result<Vec<HostRecord>> {
        let rows = sqlx::query(
            "SELECT ip_address, port, organization, country_code, location, latitude, \
             longitude, original_search_query, updated_date \
             FROM ip_search_result ORDER BY ip_address, port",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| HostRecord {
                ip_address: row.get("ip_address"),
                port: row.get("port"),
                organization: row.get("organization"),
                country_code: row.get("country_code"),
                location: row.get("location"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                original_search_query: row.get("original_search_query"),
                updated_date: row.get("updated_date"),
            })
            .collect())
    }

    pub async fn indexes(&self) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            "SELECT ip_address, port, index_name, uuid, docs_count, docs_deleted, \
             store_size, store_size_bytes, updated_date \
             FROM es_indexes ORDER BY ip_address, port, index_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| IndexRecord {
                ip_address: row.get("ip_address"),
                port: row.get("port"),
                index_name: row.get("index_name"),
                uuid: row.get("uuid"),
                docs_count: row.get("docs_count"),
                docs_deleted: row.get("docs_deleted"),
                store_size: row.get("store_size"),
                store_size_bytes: row.get("store_size_bytes"),
                updated_date: row.get("updated_date"),
            })
            .collect())
    }

    /// Indexes worth sampling: at least one document, grouped by host.
    pub async fn sample_targets(&self) -> Result<Vec<SampleTarget>> {
        let rows = sqlx::query(
            "SELECT uuid, ip_address, port, index_name FROM es_indexes \
             WHERE docs_count > 0 ORDER BY ip_address, port",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SampleTarget {
                uuid: row.get("uuid"),
                ip_address: row.get("ip_address"),
                port: row.get("port"),
                index_name: row.get("index_name"),
            })
            .collect())
    }

    pub async fn samples(&self) -> Result<Vec<StoredSample>> {
        let rows = sqlx::query(
            "SELECT index_name, ip_address, port, sample FROM es_samples \
             ORDER BY ip_address, port, index_name, document_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredSample {
                ip_address: row.get("ip_address"),
                port: row.get("port"),
                index_name: row.get("index_name"),
                sample: row.get("sample"),
            })
            .collect())
    }

    pub async fn host_summaries(&self) -> Result<Vec<HostSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                h.ip_address,
                h.port,
                h.organization,
                (SELECT COUNT(*) FROM es_indexes i
                  WHERE i.ip_address = h.ip_address AND i.port = h.port) AS index_count,
                (SELECT COALESCE(SUM(i.docs_count), 0) FROM es_indexes i
                  WHERE i.ip_address = h.ip_address AND i.port = h.port) AS docs_count,
                (SELECT COUNT(*) FROM es_samples s
                  WHERE s.ip_address = h.ip_address AND s.port = h.port) AS sample_count
            FROM ip_search_result h
            ORDER BY index_count DESC, h.ip_address, h.port
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| HostSummary {
                ip_address: row.get("ip_address"),
                port: row.get("port"),
                organization: row.get("organization"),
                index_count: row.get("index_count"),
                docs_count: row.get("docs_count"),
                sample_count: row.get("sample_count"),
            })
            .collect())
    }
}
