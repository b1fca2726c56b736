use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stage of a settlement run, as shown to the admin progress UI.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Idle,
    Starting,
    SettlingMatch,
    RecomputingTotals,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

impl ProgressPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressPhase::Completed
                | ProgressPhase::CompletedWithErrors
                | ProgressPhase::Failed
                | ProgressPhase::Cancelled
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(phase: ProgressPhase, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn idle() -> Self {
        Self::new(ProgressPhase::Idle, 0, 0, "No settlement has run yet")
    }
}

/// Scoring messages published on the global events channel
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "event_type")]
pub enum ScoringEvent {
    #[serde(rename = "settlement_progress")]
    SettlementProgress {
        progress: ProgressUpdate,
    },

    #[serde(rename = "match_settled")]
    MatchSettled {
        match_id: Uuid,
        updated_count: usize,
        settled_at: DateTime<Utc>,
    },

    #[serde(rename = "user_totals_recomputed")]
    UserTotalsRecomputed {
        users_updated: usize,
        failed_users: Vec<Uuid>,
        recomputed_at: DateTime<Utc>,
    },
}
