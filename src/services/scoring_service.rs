use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::settings::ScoringSettings;
use crate::db::{with_timeout, ScoringStore};
use crate::models::profile::LeaderboardEntry;
use crate::models::scoring_events::{ProgressPhase, ProgressUpdate, ScoringEvent};
use crate::scoring::ScoringError;
use crate::services::batch_settlement_service::{BatchSettlementService, BatchSettlementSummary};
use crate::services::match_settlement_service::{MatchSettlement, MatchSettlementService};
use crate::services::progress::{CancellationFlag, ProgressFanout, ProgressReporter, ProgressTracker};
use crate::services::redis_service::RedisEventPublisher;
use crate::services::user_points_service::{RecomputeReport, UserPointsService};

/// Entry point used by admin actions and the scheduler.
pub struct ScoringService {
    store: Arc<dyn ScoringStore>,
    timeout: Duration,
    settlement: MatchSettlementService,
    user_points: UserPointsService,
    batch: BatchSettlementService,
    tracker: ProgressTracker,
    reporter: Arc<dyn ProgressReporter>,
    publisher: Option<RedisEventPublisher>,
    cancel: CancellationFlag,
    // Held for the whole of a batch or global recompute
    run_guard: Mutex<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub settlement: MatchSettlement,
    pub recompute: RecomputeReport,
}

impl SettlementReport {
    pub fn is_complete(&self) -> bool {
        self.recompute.is_complete()
    }
}

impl ScoringService {
    pub fn new(
        store: Arc<dyn ScoringStore>,
        settings: &ScoringSettings,
        publisher: Option<RedisEventPublisher>,
    ) -> Self {
        let timeout = settings.store_timeout();
        let tracker = ProgressTracker::new();

        let mut fanout = ProgressFanout::new().with(Arc::new(tracker.clone()));
        if let Some(publisher) = &publisher {
            fanout = fanout.with(Arc::new(publisher.clone()));
        }
        let reporter: Arc<dyn ProgressReporter> = Arc::new(fanout);

        Self {
            settlement: MatchSettlementService::new(store.clone(), timeout),
            user_points: UserPointsService::new(store.clone(), timeout),
            batch: BatchSettlementService::new(store.clone(), timeout, reporter.clone()),
            store,
            timeout,
            tracker,
            reporter,
            publisher,
            cancel: CancellationFlag::new(),
            run_guard: Mutex::new(()),
        }
    }

    async fn publish(&self, event: ScoringEvent) {
        if let Some(publisher) = &self.publisher {
            publisher.publish_or_log(&event).await;
        }
    }

    async fn publish_recompute(&self, report: &RecomputeReport) {
        self.publish(ScoringEvent::UserTotalsRecomputed {
            users_updated: report.users_updated,
            failed_users: report.failed_user_ids(),
            recomputed_at: Utc::now(),
        })
        .await;
    }

    /// Settle one match and refresh the totals of the users who predicted it.
    pub async fn settle_match(&self, match_id: Uuid) -> Result<SettlementReport, ScoringError> {
        let settlement = self.settlement.settle_match(match_id).await?;
        self.publish(ScoringEvent::MatchSettled {
            match_id,
            updated_count: settlement.updated_count,
            settled_at: Utc::now(),
        })
        .await;

        let recompute = self.user_points.recompute_users(&settlement.affected_users).await;
        self.publish_recompute(&recompute).await;

        Ok(SettlementReport { settlement, recompute })
    }

    /// Enter a match's real score, settle it and refresh every user's total.
    #[tracing::instrument(name = "Finalize match result", skip(self), fields(match_id = %match_id))]
    pub async fn finalize_match_result(
        &self,
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    ) -> Result<SettlementReport, ScoringError> {
        with_timeout(
            self.timeout,
            "record_match_result",
            self.store.record_match_result(match_id, home_score, away_score),
        )
        .await?
        .ok_or(ScoringError::NotFound { match_id })?;

        tracing::info!("📝 Recorded result for match {}: {} - {}", match_id, home_score, away_score);

        let settlement = self.settlement.settle_match(match_id).await?;
        self.publish(ScoringEvent::MatchSettled {
            match_id,
            updated_count: settlement.updated_count,
            settled_at: Utc::now(),
        })
        .await;

        let recompute = self.user_points.recompute_all_users().await?;
        self.publish_recompute(&recompute).await;

        Ok(SettlementReport { settlement, recompute })
    }

    /// Settle every finished match and recompute all totals.
    ///
    /// Only one run at a time; a second caller gets `AlreadyRunning` and the
    /// running batch keeps any pending cancellation.
    pub async fn settle_all_finished_matches(&self) -> Result<BatchSettlementSummary, ScoringError> {
        let _running = self.run_guard.try_lock().map_err(|_| ScoringError::AlreadyRunning)?;
        self.cancel.reset();
        let summary = self.batch.settle_all_finished_matches(&self.cancel).await?;
        if let Some(report) = &summary.recompute {
            self.publish_recompute(report).await;
        }
        Ok(summary)
    }

    pub async fn recompute_all_users(&self) -> Result<RecomputeReport, ScoringError> {
        let _running = self.run_guard.try_lock().map_err(|_| ScoringError::AlreadyRunning)?;
        self.reporter
            .report(ProgressUpdate::new(ProgressPhase::Starting, 0, 0, "Recomputing user totals"))
            .await;

        match self.user_points.recompute_all_users().await {
            Ok(report) => {
                let phase = if report.is_complete() {
                    ProgressPhase::Completed
                } else {
                    ProgressPhase::CompletedWithErrors
                };
                self.reporter
                    .report(ProgressUpdate::new(phase, report.users_updated, report.users_updated, report.to_string()))
                    .await;
                self.publish_recompute(&report).await;
                Ok(report)
            }
            Err(e) => {
                self.reporter
                    .report(ProgressUpdate::new(ProgressPhase::Failed, 0, 0, e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, ScoringError> {
        let entries = with_timeout(self.timeout, "leaderboard", self.store.leaderboard(limit)).await?;
        Ok(entries)
    }

    pub fn progress(&self) -> ProgressUpdate {
        self.tracker.snapshot()
    }

    /// Ask a running batch to stop before its next match.
    pub fn cancel_batch(&self) {
        tracing::warn!("🛑 Cancellation requested for the running settlement batch");
        self.cancel.cancel();
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }
}
