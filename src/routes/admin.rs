use actix_web::{get, post, web, HttpResponse, Result};
use uuid::Uuid;

use crate::handlers::admin::scoring_handler;
use crate::models::fixture::MatchResultRequest;
use crate::services::ScoringService;

/// Settle one finished match
#[post("/matches/{match_id}/settle")]
async fn settle_match(
    path: web::Path<Uuid>,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    let match_id = path.into_inner();
    scoring_handler::settle_match(match_id, scoring).await
}

/// Enter a match result and settle it
#[post("/matches/{match_id}/result")]
async fn finalize_match_result(
    path: web::Path<Uuid>,
    request: web::Json<MatchResultRequest>,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    let match_id = path.into_inner();
    scoring_handler::finalize_match_result(match_id, request, scoring).await
}

#[post("/scoring/recalculate")]
async fn recalculate_all(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    scoring_handler::recalculate_all(scoring).await
}

#[post("/scoring/recompute-users")]
async fn recompute_users(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    scoring_handler::recompute_users(scoring).await
}

#[post("/scoring/cancel")]
async fn cancel_recalculation(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    scoring_handler::cancel_recalculation(scoring).await
}

#[get("/scoring/progress")]
async fn get_progress(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    scoring_handler::get_progress(scoring).await
}

pub fn init_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(settle_match)
            .service(finalize_match_result)
            .service(recalculate_all)
            .service(recompute_users)
            .service(cancel_recalculation)
            .service(get_progress)
    );
}
