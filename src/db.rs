//! SQLite connection management and lock-contention retry.
//!
//! Connections use WAL journal mode so that readers never block the single
//! writer. Several pipeline workers may write at once, each through its own
//! pooled connection; SQLite serializes them and reports `SQLITE_BUSY` to
//! the losers, which [`with_busy_retry`] turns into a bounded retry.

use anyhow::{bail, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::config::{DbConfig, RetryConfig};

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Connection options shared by [`open`] and [`crate::migrate::create_database`].
pub(crate) fn connect_options(path: &Path, config: &DbConfig) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
    Ok(options)
}

/// Open a connection pool to an existing database.
///
/// # Errors
///
/// Fails if the file does not exist; databases are only ever created by
/// [`crate::migrate::create_database`].
pub async fn open(path: &Path, config: &DbConfig) -> Result<SqlitePool> {
    if !path.exists() {
        bail!("Database file '{}' does not exist", path.display());
    }

    let options = connect_options(path, config)?.create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// True when `err` (or anything in its cause chain) is SQLite reporting a
/// busy or locked database.
pub fn is_busy(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .any(is_busy_sqlx)
}

fn is_busy_sqlx(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    // Extended result codes keep the primary code in the low byte.
    if let Some(code) = db_err.code().and_then(|c| c.parse::<i32>().ok()) {
        let primary = code & 0xff;
        if primary == SQLITE_BUSY || primary == SQLITE_LOCKED {
            return true;
        }
    }
    let message = db_err.message();
    message.contains("database is locked") || message.contains("database table is locked")
}

/// Run a write, retrying while SQLite reports contention.
///
/// `policy.attempts` counts every attempt including the first; between
/// attempts the task sleeps `policy.backoff_ms`. Non-contention errors and
/// the final contention error are returned unchanged.
pub async fn with_busy_retry<T, F, Fut>(policy: &RetryConfig, what: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(policy, what, is_busy, op).await
}

pub(crate) async fn retry_when<T, F, Fut, P>(
    policy: &RetryConfig,
    what: &str,
    is_transient: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!(
                    what,
                    remaining = attempts - attempt,
                    "Database locked. Retrying: {}",
                    e
                );
                tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Transient;

    impl std::fmt::Display for Transient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "transient")
        }
    }

    impl std::error::Error for Transient {}

    fn is_transient(e: &anyhow::Error) -> bool {
        e.downcast_ref::<Transient>().is_some()
    }

    fn fast_policy(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_when(&fast_policy(3), "test", is_transient, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(anyhow::Error::new(Transient))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_when(&fast_policy(3), "test", is_transient, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::Error::new(Transient))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_when(&fast_policy(3), "test", is_transient, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            bail!("constraint failed")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_errors_are_not_busy() {
        assert!(!is_busy(&anyhow::anyhow!("database is locked")));
        assert!(!is_busy(&anyhow::Error::new(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn open_missing_database_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing.db");
        let err = open(&path, &DbConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!path.exists());
    }
}
