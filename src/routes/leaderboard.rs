use actix_web::{get, web, HttpResponse, Result};

use crate::handlers::leaderboard_handler::{self, LeaderboardQuery};
use crate::services::ScoringService;

#[get("/leaderboard")]
async fn get_leaderboard(
    query: web::Query<LeaderboardQuery>,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    leaderboard_handler::get_leaderboard(query, scoring).await
}
