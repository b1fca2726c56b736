use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;
use crate::scoring::ScoringError;
use crate::services::scoring_service::ScoringService;

/// Runs the batch settlement on a cron schedule.
pub struct SchedulerService {
    scheduler: Arc<Mutex<JobScheduler>>,
    scoring: Arc<ScoringService>,
    recalculation_job: Arc<Mutex<Option<Uuid>>>,
}

impl SchedulerService {
    pub async fn new(scoring: Arc<ScoringService>) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            scoring,
            recalculation_job: Arc::new(Mutex::new(None)),
        })
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let scheduler = self.scheduler.lock().await;
        scheduler.start().await?;

        tracing::info!("✅ Scheduler service started successfully");
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), JobSchedulerError> {
        let mut scheduler = self.scheduler.lock().await;
        scheduler.shutdown().await?;

        tracing::info!("🛑 Scheduler service stopped");
        Ok(())
    }

    /// Schedule the full recalculation, replacing any previous schedule.
    pub async fn schedule_recalculation(&self, cron_expr: &str) -> Result<Uuid, JobSchedulerError> {
        self.unschedule_recalculation().await?;

        let scoring = self.scoring.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let scoring = scoring.clone();

            Box::pin(async move {
                tracing::info!("⏰ Running scheduled points recalculation");

                match scoring.settle_all_finished_matches().await {
                    Ok(summary) => {
                        tracing::info!("✅ Scheduled recalculation finished: {}", summary);
                    }
                    Err(ScoringError::AlreadyRunning) => {
                        tracing::info!("⏭️ Skipping scheduled recalculation, another run is active");
                    }
                    Err(e) => {
                        tracing::error!("❌ Scheduled recalculation could not run: {}", e);
                    }
                }
            })
        })?;

        let job_id = job.guid();
        self.scheduler.lock().await.add(job).await?;
        *self.recalculation_job.lock().await = Some(job_id);

        tracing::info!("✅ Scheduled points recalculation with cron '{}'", cron_expr);
        Ok(job_id)
    }

    pub async fn unschedule_recalculation(&self) -> Result<(), JobSchedulerError> {
        let mut job = self.recalculation_job.lock().await;

        if let Some(job_id) = job.take() {
            let scheduler = self.scheduler.lock().await;
            scheduler.remove(&job_id).await?;
            tracing::info!("✅ Removed scheduled recalculation {}", job_id);
        }

        Ok(())
    }
}
