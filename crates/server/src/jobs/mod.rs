//! Recurring jobs.
//!
//! The scheduler fires named jobs at calendar triggers, independent of
//! request traffic. Each registered job runs on its own detached task; a
//! failed firing is logged and swallowed, and the next trigger is the retry.
//! Jobs are injected as constructed collaborators, not captured ambient
//! state.

pub mod engagement;
pub mod retention;
pub mod schedule;

pub use engagement::{EngagementNotifier, EngagementNudgeJob, WeeklyBroadcastJob};
pub use retention::RetentionJob;
pub use schedule::Schedule;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;

/// A unit of recurring work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// One firing. Runs to completion or fails outright; no retry within a
    /// firing.
    async fn run(&self) -> anyhow::Result<()>;
}

/// Registers jobs against calendar triggers and drives them.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<(Schedule, Arc<dyn Job>)>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job against a trigger.
    pub fn register(&mut self, schedule: Schedule, job: Arc<dyn Job>) -> &mut Self {
        self.entries.push((schedule, job));
        self
    }

    /// Start one detached task per registered job.
    ///
    /// The handles are returned for completeness; the tasks run until the
    /// process exits.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|(schedule, job)| {
                tracing::info!(job = job.name(), "job scheduled");
                tokio::spawn(drive(schedule, job))
            })
            .collect()
    }
}

/// Sleep until each firing instant, run the job, repeat.
async fn drive(schedule: Schedule, job: Arc<dyn Job>) {
    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        tracing::info!(job = job.name(), "job firing");
        if let Err(error) = job.run().await {
            // Terminal for this firing only; the next trigger retries.
            tracing::error!(job = job.name(), %error, "job failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_failing_run_does_not_stop_the_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob {
            runs: Arc::clone(&runs),
            fail: true,
        };

        // Drive two firings by hand: the error from the first must not
        // prevent the second.
        job.run().await.unwrap_err();
        job.run().await.unwrap_err();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn spawn_returns_one_handle_per_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register(
            Schedule::daily(0, 0),
            Arc::new(CountingJob {
                runs: Arc::clone(&runs),
                fail: false,
            }),
        );
        scheduler.register(
            Schedule::weekly(chrono::Weekday::Fri, 14, 0),
            Arc::new(CountingJob { runs, fail: false }),
        );

        let handles = scheduler.spawn();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.abort();
        }
    }
}
