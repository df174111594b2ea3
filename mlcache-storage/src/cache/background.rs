//! Bounded spawner for detached propagation tasks.
//!
//! Cache-aside backfill, write-back propagation and per-level flushes run
//! here. The caller never receives a handle and never waits: tasks are
//! spawned onto the ambient tokio runtime and then queue for one of a fixed
//! number of permits before touching any level. Once launched a task cannot
//! be cancelled, and its outcome is only counted (and, when enabled, logged).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mlcache_core::TierResult;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use super::stats::TierCounters;

/// Fire-and-forget task spawner with a concurrency bound.
#[derive(Debug, Clone)]
pub struct BackgroundSpawner {
    permits: Arc<Semaphore>,
    max_tasks: usize,
    report_failures: bool,
    counters: Arc<TierCounters>,
}

impl BackgroundSpawner {
    pub fn new(max_tasks: usize, report_failures: bool, counters: Arc<TierCounters>) -> Self {
        let max_tasks = max_tasks.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_tasks)),
            max_tasks,
            report_failures,
            counters,
        }
    }

    /// Launch `work` detached from the caller.
    ///
    /// Outside a tokio runtime there is nowhere to run the task; it is
    /// dropped and counted as a failure.
    pub fn spawn<F>(&self, task: &'static str, work: F)
    where
        F: Future<Output = TierResult<()>> + Send + 'static,
    {
        self.launch(task, None, work);
    }

    /// Launch `work` detached, after `delay` has elapsed.
    ///
    /// The delay runs before a permit is taken, so waiting tasks never
    /// hold back others that are ready to touch a level.
    pub fn spawn_after<F>(&self, task: &'static str, delay: Duration, work: F)
    where
        F: Future<Output = TierResult<()>> + Send + 'static,
    {
        self.launch(task, Some(delay), work);
    }

    fn launch<F>(&self, task: &'static str, delay: Option<Duration>, work: F)
    where
        F: Future<Output = TierResult<()>> + Send + 'static,
    {
        self.counters.record_background_task();

        let Ok(runtime) = Handle::try_current() else {
            self.counters.record_background_failure();
            if self.report_failures {
                tracing::warn!(task, "No async runtime available, background task dropped");
            }
            return;
        };

        let permits = Arc::clone(&self.permits);
        let counters = Arc::clone(&self.counters);
        let report = self.report_failures;

        // The JoinHandle is dropped: nobody observes the outcome.
        drop(runtime.spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = work.await {
                counters.record_background_failure();
                if report {
                    tracing::warn!(task, error = %e, "Background cache task failed");
                }
            }
        }));
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }
}
