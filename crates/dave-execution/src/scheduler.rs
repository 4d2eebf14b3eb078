//! Named periodic jobs on tokio tasks.

use dave_core::{DaveError, Result};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct ScheduledJob {
    name: String,
    handle: JoinHandle<()>,
}

/// Runs jobs at fixed intervals until shut down.
///
/// A job first runs one full interval after it is registered. A failing run
/// is logged and the job keeps its schedule. Cancellation is observed between
/// runs, so `shutdown` lets an in-flight run finish.
pub struct JobScheduler {
    token: CancellationToken,
    jobs: Vec<ScheduledJob>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            jobs: Vec::new(),
        }
    }

    /// Registers `job` to run every `period`.
    ///
    /// # Errors
    ///
    /// A zero `period` is rejected as a configuration error.
    pub fn spawn_interval<F, Fut>(
        &mut self,
        name: impl Into<String>,
        period: Duration,
        job: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if period.is_zero() {
            return Err(DaveError::config(format!(
                "job '{name}' needs a non-zero interval"
            )));
        }

        let token = self.token.child_token();
        let job_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            tracing::info!(job = %job_name, interval_secs = period.as_secs(), "Job scheduled");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tracing::debug!(job = %job_name, "Job tick");
                if let Err(err) = job().await {
                    tracing::error!(job = %job_name, error = %err, "Job run failed");
                }
            }
            tracing::debug!(job = %job_name, "Job stopped");
        });

        self.jobs.push(ScheduledJob { name, handle });
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name.as_str()).collect()
    }

    /// Token cancelled when the scheduler shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels every job and waits for all of them to stop.
    pub async fn shutdown(self) {
        self.token.cancel();
        let (names, handles): (Vec<_>, Vec<_>) = self
            .jobs
            .into_iter()
            .map(|job| (job.name, job.handle))
            .unzip();

        for (name, joined) in names.iter().zip(join_all(handles).await) {
            if let Err(err) = joined {
                tracing::warn!(job = %name, error = %err, "Job task ended abnormally");
            }
        }
        tracing::info!(jobs = names.len(), "Scheduler stopped");
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(
        counter: &Arc<AtomicUsize>,
        fail: bool,
    ) -> impl Fn() -> futures::future::Ready<Result<()>> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                futures::future::ready(Err(DaveError::internal("boom")))
            } else {
                futures::future::ready(Ok(()))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_waits_one_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .spawn_interval("tick", Duration::from_secs(10), counting_job(&counter, false))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_the_schedule() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .spawn_interval("flaky", Duration::from_secs(10), counting_job(&counter, true))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_jobs() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .spawn_interval("first", Duration::from_secs(10), counting_job(&first, false))
            .unwrap();
        scheduler
            .spawn_interval("second", Duration::from_secs(20), counting_job(&second, false))
            .unwrap();
        assert_eq!(scheduler.job_names(), vec!["first", "second"]);

        let token = scheduler.cancellation_token();
        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.shutdown().await;
        assert!(token.is_cancelled());

        let (first_runs, second_runs) = (first.load(Ordering::SeqCst), second.load(Ordering::SeqCst));
        assert_eq!((first_runs, second_runs), (2, 1));

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(first.load(Ordering::SeqCst), first_runs);
        assert_eq!(second.load(Ordering::SeqCst), second_runs);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let mut scheduler = JobScheduler::new();
        let err = scheduler
            .spawn_interval("busy", Duration::ZERO, || async { Ok(()) })
            .unwrap_err();
        assert!(err.is_config());
        assert!(scheduler.job_names().is_empty());
    }
}
