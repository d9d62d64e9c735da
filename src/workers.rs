//! Fixed-size worker pool for per-unit pipeline work.
//!
//! Each unit runs in its own tokio task, gated by a semaphore with
//! `workers` permits, so at most `workers` units are in flight at once.
//! Every unit produces its own `Result`; one failing (or panicking) unit
//! never cancels its siblings. The pool lives for a single call.
//!
//! Every finished unit, failed or not, ticks the stage's
//! [`StageProgress`].

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::progress::StageProgress;

/// Outcome of one dispatched unit.
#[derive(Debug)]
pub struct UnitOutcome<U, R> {
    pub unit: U,
    pub result: Result<R>,
}

/// Run `task` over every unit with at most `workers` running concurrently.
///
/// Outcomes are returned in dispatch order, but units may complete in any
/// order. `progress` is finished once every unit has reported.
pub async fn run_bounded<U, R, F, Fut>(
    workers: usize,
    units: Vec<U>,
    progress: &StageProgress,
    task: F,
) -> Vec<UnitOutcome<U, R>>
where
    U: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(U) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let task = Arc::new(task);
    let mut handles = Vec::with_capacity(units.len());

    for unit in units {
        let semaphore = Arc::clone(&semaphore);
        let task = Arc::clone(&task);
        let owned = unit.clone();
        let done = progress.unit();
        let handle = tokio::spawn(async move {
            let _done = done;
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| anyhow::anyhow!("worker pool closed"))?;
            task(owned).await
        });
        handles.push((unit, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (unit, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::anyhow!("worker task failed: {}", join_err)),
        };
        outcomes.push(UnitOutcome { unit, result });
    }
    progress.finish();
    outcomes
}
