use actix_web::{web, HttpResponse, Result};
use uuid::Uuid;

use crate::models::common::ApiResponse;
use crate::models::fixture::MatchResultRequest;
use crate::scoring::ScoringError;
use crate::services::batch_settlement_service::BatchOutcome;
use crate::services::ScoringService;

/// Map a scoring failure onto an HTTP status with an error body.
pub fn scoring_error_response(error: &ScoringError) -> HttpResponse {
    let body = ApiResponse::<()>::error_with_message(error.kind(), error.to_string());
    match error {
        ScoringError::NotFound { .. } => HttpResponse::NotFound().json(body),
        ScoringError::InvalidState { .. } | ScoringError::AlreadyRunning => {
            HttpResponse::Conflict().json(body)
        }
        ScoringError::PersistenceFailure(_) => HttpResponse::ServiceUnavailable().json(body),
    }
}

/// Settle a single finished match
pub async fn settle_match(
    match_id: Uuid,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    tracing::info!("📋 Admin requested settlement of match {}", match_id);

    match scoring.settle_match(match_id).await {
        Ok(report) => {
            let message = format!(
                "Match settled, {} predictions updated",
                report.settlement.updated_count
            );
            if report.is_complete() {
                Ok(HttpResponse::Ok().json(ApiResponse::success(message, report)))
            } else {
                Ok(HttpResponse::Ok().json(ApiResponse::partial(
                    format!("{}, but {} user totals failed", message, report.recompute.failed_users.len()),
                    report,
                )))
            }
        }
        Err(e) => {
            tracing::error!("Failed to settle match {}: {}", match_id, e);
            Ok(scoring_error_response(&e))
        }
    }
}

/// Enter the real score of a match, then settle it and refresh all totals
pub async fn finalize_match_result(
    match_id: Uuid,
    request: web::Json<MatchResultRequest>,
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    if request.home_score < 0 || request.away_score < 0 {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::<()>::error_with_message(
            "invalid_score",
            "Scores must be non-negative",
        )));
    }

    tracing::info!("📋 Admin entered result for match {}: {} - {}",
        match_id, request.home_score, request.away_score);

    match scoring.finalize_match_result(match_id, request.home_score, request.away_score).await {
        Ok(report) => {
            let message = format!(
                "Result recorded, {} predictions updated",
                report.settlement.updated_count
            );
            if report.is_complete() {
                Ok(HttpResponse::Ok().json(ApiResponse::success(message, report)))
            } else {
                Ok(HttpResponse::Ok().json(ApiResponse::partial(message, report)))
            }
        }
        Err(e) => {
            tracing::error!("Failed to finalize match {}: {}", match_id, e);
            Ok(scoring_error_response(&e))
        }
    }
}

/// Recalculate points for all finished matches
pub async fn recalculate_all(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    tracing::info!("📋 Admin requested recalculation of all finished matches");

    match scoring.settle_all_finished_matches().await {
        Ok(summary) => {
            let message = summary.to_string();
            if summary.outcome == BatchOutcome::Completed {
                Ok(HttpResponse::Ok().json(ApiResponse::success(message, summary)))
            } else {
                Ok(HttpResponse::Ok().json(ApiResponse::partial(message, summary)))
            }
        }
        Err(e) => {
            tracing::error!("Recalculation could not run: {}", e);
            Ok(scoring_error_response(&e))
        }
    }
}

/// Recompute every user's total from their settled predictions
pub async fn recompute_users(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    match scoring.recompute_all_users().await {
        Ok(report) => {
            let message = report.to_string();
            if report.is_complete() {
                Ok(HttpResponse::Ok().json(ApiResponse::success(message, report)))
            } else {
                Ok(HttpResponse::Ok().json(ApiResponse::partial(message, report)))
            }
        }
        Err(e) => {
            tracing::error!("User totals could not be recomputed: {}", e);
            Ok(scoring_error_response(&e))
        }
    }
}

/// Ask the running recalculation to stop before its next match
pub async fn cancel_recalculation(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    scoring.cancel_batch();
    Ok(HttpResponse::Accepted().json(ApiResponse::<()>::success_message("Cancellation requested")))
}

/// Latest progress of a settlement run
pub async fn get_progress(
    scoring: web::Data<ScoringService>,
) -> Result<HttpResponse> {
    let progress = scoring.progress();
    Ok(HttpResponse::Ok().json(ApiResponse::success(progress.message.clone(), progress)))
}
