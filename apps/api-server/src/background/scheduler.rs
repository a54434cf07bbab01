//! Cron-style job scheduler using tokio-cron-scheduler.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use folio_core::services::CounterMaintenance;

use crate::config::ReconcileSettings;

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    enabled: bool,
}

impl Scheduler {
    pub async fn new(enabled: bool) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, enabled })
    }

    /// Add a cron job.
    ///
    /// # Example
    /// ```ignore
    /// scheduler.add_cron("0 0 * * * *", || async {
    ///     tracing::info!("Running hourly job");
    /// }).await?;
    /// ```
    pub async fn add_cron<F, Fut>(
        &self,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

/// Register the periodic counter reconciliation sweep and start the
/// scheduler. Failures of a single sweep are logged; the next run retries.
pub async fn start_reconciliation(
    settings: &ReconcileSettings,
    counters: CounterMaintenance,
) -> Result<Scheduler, JobSchedulerError> {
    let scheduler = Scheduler::new(settings.enabled).await?;

    scheduler
        .add_cron(&settings.cron, move || {
            let counters = counters.clone();
            async move {
                match counters.reconcile_all().await {
                    Ok(report) if report.repaired > 0 => tracing::warn!(
                        posts = report.posts,
                        comments = report.comments,
                        repaired = report.repaired,
                        "Counter drift repaired"
                    ),
                    Ok(report) => tracing::debug!(
                        posts = report.posts,
                        comments = report.comments,
                        "Counters consistent"
                    ),
                    Err(e) => tracing::error!(error = %e, "Counter reconciliation failed"),
                }
            }
        })
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}
