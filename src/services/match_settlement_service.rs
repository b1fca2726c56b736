use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{with_timeout, ScoringStore};
use crate::models::fixture::{Match, MatchStatus};
use crate::models::prediction::{Prediction, PredictionPoints};
use crate::scoring::{evaluate, InvalidStateReason, ScoringError};

/// Settles a single finished match.
pub struct MatchSettlementService {
    store: Arc<dyn ScoringStore>,
    timeout: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchSettlement {
    pub match_id: Uuid,
    pub updated_count: usize,
    /// Owners of the settled predictions, for scoped total recompute.
    pub affected_users: Vec<Uuid>,
}

impl MatchSettlementService {
    pub fn new(store: Arc<dyn ScoringStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Award points to every prediction of a finished match.
    ///
    /// Re-running is safe: values are derived from the stored score and
    /// guesses only, so a second run writes the same points.
    #[tracing::instrument(
        name = "Settle match",
        skip(self),
        fields(match_id = %match_id)
    )]
    pub async fn settle_match(&self, match_id: Uuid) -> Result<MatchSettlement, ScoringError> {
        let game = with_timeout(self.timeout, "get_match", self.store.get_match(match_id))
            .await?
            .ok_or(ScoringError::NotFound { match_id })?;

        let (home_score, away_score) = ensure_settleable(&game)?;

        let predictions = with_timeout(
            self.timeout,
            "list_predictions",
            self.store.list_predictions(match_id),
        )
        .await?;

        if predictions.is_empty() {
            tracing::info!("🎯 [SETTLEMENT] Match {} has no predictions, nothing to award", match_id);
            return Ok(MatchSettlement {
                match_id,
                updated_count: 0,
                affected_users: Vec::new(),
            });
        }

        let points = compute_points(home_score, away_score, &predictions);

        let written = with_timeout(
            self.timeout,
            "write_prediction_points",
            self.store.write_prediction_points(&points),
        )
        .await?;

        if written as usize != points.len() {
            tracing::warn!("⚠️  [SETTLEMENT] Match {}: computed {} point values but store touched {} rows",
                match_id, points.len(), written);
        }

        let affected_users: BTreeSet<Uuid> = predictions.iter().map(|p| p.user_id).collect();

        tracing::info!("✅ [SETTLEMENT] Match {} ({} - {}) settled: {} predictions scored",
            match_id, home_score, away_score, points.len());

        Ok(MatchSettlement {
            match_id,
            updated_count: points.len(),
            affected_users: affected_users.into_iter().collect(),
        })
    }
}

/// A match can be settled only once it is finished with both scores entered.
pub fn ensure_settleable(game: &Match) -> Result<(i32, i32), ScoringError> {
    if game.status != MatchStatus::Finished {
        return Err(ScoringError::InvalidState {
            match_id: game.id,
            reason: InvalidStateReason::NotFinished { status: game.status },
        });
    }

    game.final_score().ok_or(ScoringError::InvalidState {
        match_id: game.id,
        reason: InvalidStateReason::MissingScores,
    })
}

pub fn compute_points(home_score: i32, away_score: i32, predictions: &[Prediction]) -> Vec<PredictionPoints> {
    predictions
        .iter()
        .map(|prediction| PredictionPoints {
            prediction_id: prediction.id,
            points: evaluate(home_score, away_score, prediction.home_score, prediction.away_score),
        })
        .collect()
}
