use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: Option<String>,
    // Derived cache: sum of the user's awarded prediction points
    pub points: i32,
    pub updated_at: Option<DateTime<Utc>>,
}
