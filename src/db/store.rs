use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::fixture::Match;
use crate::models::prediction::{Prediction, PredictionPoints};
use crate::models::profile::LeaderboardEntry;
use crate::scoring::StoreError;

/// Data-access boundary of the scoring engine.
///
/// Handed explicitly to the settlement services; nothing in the engine holds
/// a global connection.
#[async_trait]
pub trait ScoringStore: Send + Sync {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>, StoreError>;

    /// Finished matches ordered by round, then start time.
    async fn list_finished_matches(&self) -> Result<Vec<Match>, StoreError>;

    async fn list_predictions(&self, match_id: Uuid) -> Result<Vec<Prediction>, StoreError>;

    /// Write all point values in one batch. Returns the number of rows touched.
    async fn write_prediction_points(&self, points: &[PredictionPoints]) -> Result<u64, StoreError>;

    /// Sum of the user's non-null awarded points.
    async fn sum_points_for_user(&self, user_id: Uuid) -> Result<i64, StoreError>;

    async fn write_user_total_points(&self, user_id: Uuid, total: i64) -> Result<(), StoreError>;

    async fn list_all_user_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    fn supports_bulk_recompute(&self) -> bool {
        false
    }

    /// Recompute every user's total in a single set-based statement.
    /// Returns the number of profiles written.
    async fn recompute_all_user_totals(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported { operation: "recompute_all_user_totals" })
    }

    /// Store the real score and mark the match finished.
    async fn record_match_result(
        &self,
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    ) -> Result<Option<Match>, StoreError>;

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// Bound a store call by `limit`; an elapsed call becomes [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️ Store call '{}' exceeded {:?}", operation, limit);
            Err(StoreError::Timeout { operation })
        }
    }
}
