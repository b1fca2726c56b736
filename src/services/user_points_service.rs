use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{with_timeout, ScoringStore};
use crate::scoring::{ScoringError, StoreError};

/// Keeps `profiles.points` equal to the sum of each user's awarded points.
///
/// Totals are always recomputed from the predictions, never incremented.
pub struct UserPointsService {
    store: Arc<dyn ScoringStore>,
    timeout: Duration,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeStrategy {
    SetBased,
    PerUser,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserRecomputeFailure {
    pub user_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecomputeReport {
    pub strategy: RecomputeStrategy,
    pub users_updated: usize,
    pub failed_users: Vec<UserRecomputeFailure>,
}

impl RecomputeReport {
    pub fn is_complete(&self) -> bool {
        self.failed_users.is_empty()
    }

    pub fn failed_user_ids(&self) -> Vec<Uuid> {
        self.failed_users.iter().map(|f| f.user_id).collect()
    }
}

impl std::fmt::Display for RecomputeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "User totals: {} updated, {} failed ({:?})",
            self.users_updated, self.failed_users.len(), self.strategy)
    }
}

impl UserPointsService {
    pub fn new(store: Arc<dyn ScoringStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Recompute the totals of the given users, one at a time.
    ///
    /// Failures are collected per user; the remaining users are still
    /// processed.
    #[tracing::instrument(
        name = "Recompute user totals",
        skip(self, user_ids),
        fields(user_count = user_ids.len())
    )]
    pub async fn recompute_users(&self, user_ids: &[Uuid]) -> RecomputeReport {
        let unique: BTreeSet<Uuid> = user_ids.iter().copied().collect();
        let mut report = RecomputeReport {
            strategy: RecomputeStrategy::PerUser,
            users_updated: 0,
            failed_users: Vec::new(),
        };

        for user_id in unique {
            match self.recompute_user(user_id).await {
                Ok(total) => {
                    tracing::debug!("User {} total recomputed: {}", user_id, total);
                    report.users_updated += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to recompute total for user {}: {}", user_id, e);
                    report.failed_users.push(UserRecomputeFailure {
                        user_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn recompute_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let total = with_timeout(
            self.timeout,
            "sum_points_for_user",
            self.store.sum_points_for_user(user_id),
        )
        .await?;

        with_timeout(
            self.timeout,
            "write_user_total_points",
            self.store.write_user_total_points(user_id, total),
        )
        .await?;

        Ok(total)
    }

    /// Recompute every user's total.
    ///
    /// Uses the store's set-based statement when available. When it is
    /// missing or rejected, falls back to the per-user loop so failures can
    /// be attributed to individual users. Only a failure to list users is
    /// returned as an error.
    #[tracing::instrument(name = "Recompute all user totals", skip(self))]
    pub async fn recompute_all_users(&self) -> Result<RecomputeReport, ScoringError> {
        if self.store.supports_bulk_recompute() {
            match with_timeout(
                self.timeout,
                "recompute_all_user_totals",
                self.store.recompute_all_user_totals(),
            )
            .await
            {
                Ok(updated) => {
                    tracing::info!("✅ Recomputed totals for {} users in one pass", updated);
                    return Ok(RecomputeReport {
                        strategy: RecomputeStrategy::SetBased,
                        users_updated: updated as usize,
                        failed_users: Vec::new(),
                    });
                }
                Err(e) => {
                    tracing::warn!("⚠️  Set-based recompute failed ({}), falling back to per-user recompute", e);
                }
            }
        }

        let user_ids = with_timeout(self.timeout, "list_all_user_ids", self.store.list_all_user_ids()).await?;
        let report = self.recompute_users(&user_ids).await;

        if report.is_complete() {
            tracing::info!("✅ Recomputed totals for {} users one by one", report.users_updated);
        } else {
            tracing::error!("❌ Recompute left {} of {} users stale",
                report.failed_users.len(), user_ids.len());
        }

        Ok(report)
    }
}
