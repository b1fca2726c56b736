use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{with_timeout, ScoringStore};
use crate::models::scoring_events::{ProgressPhase, ProgressUpdate};
use crate::scoring::ScoringError;
use crate::services::match_settlement_service::MatchSettlementService;
use crate::services::progress::{CancellationFlag, ProgressReporter};
use crate::services::user_points_service::{RecomputeReport, UserPointsService};

/// Settles every finished match, one after another, then recomputes all
/// user totals once.
pub struct BatchSettlementService {
    store: Arc<dyn ScoringStore>,
    timeout: Duration,
    settlement: MatchSettlementService,
    user_points: UserPointsService,
    reporter: Arc<dyn ProgressReporter>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchSettlementFailure {
    pub match_id: Uuid,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    CompletedWithErrors,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSettlementSummary {
    pub outcome: BatchOutcome,
    pub matches_total: usize,
    /// Matches settled successfully
    pub matches_processed: usize,
    pub predictions_updated: usize,
    pub per_match_errors: Vec<MatchSettlementFailure>,
    pub recompute: Option<RecomputeReport>,
    /// Set when user totals could not be recomputed at all
    pub recompute_error: Option<String>,
    pub cancelled: bool,
}

impl BatchSettlementSummary {
    fn empty() -> Self {
        Self {
            outcome: BatchOutcome::Completed,
            matches_total: 0,
            matches_processed: 0,
            predictions_updated: 0,
            per_match_errors: Vec::new(),
            recompute: None,
            recompute_error: None,
            cancelled: false,
        }
    }

    fn resolve_outcome(&self) -> BatchOutcome {
        let recompute_incomplete = self.recompute_error.is_some()
            || self.recompute.as_ref().is_some_and(|r| !r.is_complete());

        if self.cancelled {
            BatchOutcome::Cancelled
        } else if !self.per_match_errors.is_empty() || recompute_incomplete {
            BatchOutcome::CompletedWithErrors
        } else {
            BatchOutcome::Completed
        }
    }
}

impl std::fmt::Display for BatchSettlementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Settlement: {}/{} matches settled, {} predictions updated, {} errors",
            self.matches_processed, self.matches_total, self.predictions_updated, self.per_match_errors.len())
    }
}

impl BatchSettlementService {
    pub fn new(
        store: Arc<dyn ScoringStore>,
        timeout: Duration,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            settlement: MatchSettlementService::new(store.clone(), timeout),
            user_points: UserPointsService::new(store.clone(), timeout),
            store,
            timeout,
            reporter,
        }
    }

    async fn report(&self, phase: ProgressPhase, current: usize, total: usize, message: String) {
        self.reporter.report(ProgressUpdate::new(phase, current, total, message)).await;
    }

    /// Settle all finished matches.
    ///
    /// A failing match is recorded in `per_match_errors` and the run moves
    /// on. Only a failure to list the finished matches aborts the run.
    /// `cancel` is checked before each match, never mid-match.
    #[tracing::instrument(name = "Settle all finished matches", skip(self, cancel))]
    pub async fn settle_all_finished_matches(
        &self,
        cancel: &CancellationFlag,
    ) -> Result<BatchSettlementSummary, ScoringError> {
        self.report(ProgressPhase::Starting, 0, 0, "Loading finished matches".to_string()).await;

        let matches = match with_timeout(
            self.timeout,
            "list_finished_matches",
            self.store.list_finished_matches(),
        )
        .await
        {
            Ok(matches) => matches,
            Err(e) => {
                self.report(ProgressPhase::Failed, 0, 0, format!("Could not load finished matches: {}", e)).await;
                return Err(e.into());
            }
        };

        let total = matches.len();
        if total == 0 {
            self.report(ProgressPhase::Completed, 0, 0, "No finished matches to settle".to_string()).await;
            return Ok(BatchSettlementSummary::empty());
        }

        tracing::info!("🎯 [BATCH] Settling {} finished matches", total);

        let mut summary = BatchSettlementSummary {
            matches_total: total,
            ..BatchSettlementSummary::empty()
        };

        for (index, game) in matches.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("🛑 [BATCH] Cancelled after {} of {} matches", index, total);
                summary.cancelled = true;
                break;
            }

            self.report(
                ProgressPhase::SettlingMatch,
                index + 1,
                total,
                format!("Settling match {} (round {})", game.id, game.round),
            )
            .await;

            match self.settlement.settle_match(game.id).await {
                Ok(settlement) => {
                    summary.matches_processed += 1;
                    summary.predictions_updated += settlement.updated_count;
                }
                Err(e) => {
                    tracing::error!("❌ [BATCH] Match {} failed: {}", game.id, e);
                    summary.per_match_errors.push(MatchSettlementFailure {
                        match_id: game.id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Totals are recomputed even after a cancellation so they match what was settled
        self.report(ProgressPhase::RecomputingTotals, total, total, "Recomputing user totals".to_string()).await;

        match self.user_points.recompute_all_users().await {
            Ok(report) => summary.recompute = Some(report),
            Err(e) => {
                tracing::error!("❌ [BATCH] User totals could not be recomputed: {}", e);
                summary.recompute_error = Some(e.to_string());
            }
        }

        summary.outcome = summary.resolve_outcome();

        let phase = match summary.outcome {
            BatchOutcome::Completed => ProgressPhase::Completed,
            BatchOutcome::CompletedWithErrors => ProgressPhase::CompletedWithErrors,
            BatchOutcome::Cancelled => ProgressPhase::Cancelled,
        };
        self.report(phase, summary.matches_processed, total, summary.to_string()).await;

        tracing::info!("✅ [BATCH] {}", summary);
        Ok(summary)
    }
}
