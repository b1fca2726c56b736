use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One user's guess for one match. Unique per (user_id, match_id).
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub match_id: Uuid,
    pub home_score: i32,
    pub away_score: i32,
    /// `None` until the match has been settled. Written only by settlement.
    pub points_awarded: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A computed point value ready to be written back to a prediction.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PredictionPoints {
    pub prediction_id: Uuid,
    pub points: i32,
}
