use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

use crate::handlers::admin::scoring_handler::scoring_error_response;
use crate::models::common::ApiResponse;
use crate::services::ScoringService;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// Users ranked by total points
pub async fn get_leaderboard(
    query: web::Query<LeaderboardQuery>,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match scoring.leaderboard(limit).await {
        Ok(entries) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            format!("{} users ranked", entries.len()),
            entries,
        ))),
        Err(e) => {
            tracing::error!("Failed to load leaderboard: {}", e);
            Ok(scoring_error_response(&e))
        }
    }
}
