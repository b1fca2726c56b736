use uuid::Uuid;

use crate::models::fixture::MatchStatus;

/// Failures reported by a [`ScoringStore`](crate::db::ScoringStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call timed out: {operation}")]
    Timeout { operation: &'static str },

    #[error("Store does not support {operation}")]
    Unsupported { operation: &'static str },

    #[error("Store rejected the request: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidStateReason {
    NotFinished { status: MatchStatus },
    MissingScores,
}

impl std::fmt::Display for InvalidStateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidStateReason::NotFinished { status } => {
                write!(f, "match is not finished (status: {})", status)
            }
            InvalidStateReason::MissingScores => write!(f, "match is finished but missing real scores"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Match not found: {match_id}")]
    NotFound { match_id: Uuid },

    #[error("Cannot settle match {match_id}: {reason}")]
    InvalidState { match_id: Uuid, reason: InvalidStateReason },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("A recalculation is already running")]
    AlreadyRunning,
}

impl ScoringError {
    /// Stable label for reports and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::NotFound { .. } => "not_found",
            ScoringError::InvalidState { .. } => "invalid_state",
            ScoringError::PersistenceFailure(_) => "persistence_failure",
            ScoringError::AlreadyRunning => "already_running",
        }
    }
}
