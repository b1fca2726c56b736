use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use prode_scoring::db::{InMemoryScoringStore, ScoringStore};
use prode_scoring::models::fixture::{Match, MatchStatus};
use prode_scoring::models::prediction::{Prediction, PredictionPoints};
use prode_scoring::models::profile::LeaderboardEntry;
use prode_scoring::models::scoring_events::ProgressPhase;
use prode_scoring::scoring::{ScoringError, StoreError};
use prode_scoring::services::batch_settlement_service::BatchOutcome;
use prode_scoring::services::progress::{CancellationFlag, ProgressTracker};
use prode_scoring::services::BatchSettlementService;

mod common;
use common::fixtures::{add_finished_match, add_prediction, add_scheduled_match, add_user, build_match, expected_total, points_of};
use common::utils::{init_tracing, scoring_service};

/// Lists one extra finished match that no longer exists, as if it was
/// deleted between listing and settlement.
struct StaleListingStore {
    inner: Arc<InMemoryScoringStore>,
    stale: Match,
}

#[async_trait]
impl ScoringStore for StaleListingStore {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>, StoreError> {
        self.inner.get_match(match_id).await
    }

    async fn list_finished_matches(&self) -> Result<Vec<Match>, StoreError> {
        let mut matches = self.inner.list_finished_matches().await?;
        matches.insert(1, self.stale.clone());
        Ok(matches)
    }

    async fn list_predictions(&self, match_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        self.inner.list_predictions(match_id).await
    }

    async fn write_prediction_points(&self, points: &[PredictionPoints]) -> Result<u64, StoreError> {
        self.inner.write_prediction_points(points).await
    }

    async fn sum_points_for_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        self.inner.sum_points_for_user(user_id).await
    }

    async fn write_user_total_points(&self, user_id: Uuid, total: i64) -> Result<(), StoreError> {
        self.inner.write_user_total_points(user_id, total).await
    }

    async fn list_all_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        self.inner.list_all_user_ids().await
    }

    fn supports_bulk_recompute(&self) -> bool {
        self.inner.supports_bulk_recompute()
    }

    async fn recompute_all_user_totals(&self) -> Result<u64, StoreError> {
        self.inner.recompute_all_user_totals().await
    }

    async fn record_match_result(
        &self,
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    ) -> Result<Option<Match>, StoreError> {
        self.inner.record_match_result(match_id, home_score, away_score).await
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.inner.leaderboard(limit).await
    }
}

fn batch_service(store: Arc<dyn ScoringStore>, timeout: Duration) -> (BatchSettlementService, ProgressTracker) {
    init_tracing();
    let tracker = ProgressTracker::new();
    let service = BatchSettlementService::new(store, timeout, Arc::new(tracker.clone()));
    (service, tracker)
}

#[tokio::test]
async fn test_batch_records_missing_match_and_recomputes_once() {
    let store = Arc::new(InMemoryScoringStore::new());
    let user_a = add_user(&store, "ana");
    let user_b = add_user(&store, "beto");

    let first = add_finished_match(&store, 2, 1, 1);
    let second = add_finished_match(&store, 1, 1, 2);
    add_prediction(&store, user_a, first, 2, 1);
    add_prediction(&store, user_b, first, 0, 2);
    add_prediction(&store, user_a, second, 0, 0);
    add_prediction(&store, user_b, second, 1, 1);

    let deleted = build_match(MatchStatus::Finished, Some(3), Some(0), 1);
    let deleted_id = deleted.id;
    let stale_store: Arc<dyn ScoringStore> = Arc::new(StaleListingStore {
        inner: store.clone(),
        stale: deleted,
    });
    let (service, _) = batch_service(stale_store, Duration::from_secs(5));

    let summary = service
        .settle_all_finished_matches(&CancellationFlag::new())
        .await
        .expect("Batch should complete");

    assert_eq!(summary.matches_total, 3);
    assert_eq!(summary.matches_processed, 2);
    assert_eq!(summary.predictions_updated, 4);
    assert_eq!(summary.per_match_errors.len(), 1);
    assert_eq!(summary.per_match_errors[0].match_id, deleted_id);
    assert_eq!(summary.per_match_errors[0].kind, "not_found");
    assert_eq!(summary.outcome, BatchOutcome::CompletedWithErrors);

    assert_eq!(store.bulk_recompute_calls(), 1);
    assert_eq!(store.user_points(user_a), Some(4));
    assert_eq!(store.user_points(user_b), Some(3));
}

#[tokio::test]
async fn test_no_finished_matches_returns_empty_summary() {
    let store = Arc::new(InMemoryScoringStore::new());
    add_scheduled_match(&store, 1);
    let (service, tracker) = batch_service(store.clone(), Duration::from_secs(5));

    let summary = service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap();

    assert_eq!(summary.matches_total, 0);
    assert_eq!(summary.matches_processed, 0);
    assert_eq!(summary.predictions_updated, 0);
    assert!(summary.per_match_errors.is_empty());
    assert!(summary.recompute.is_none());
    assert_eq!(summary.outcome, BatchOutcome::Completed);
    assert_eq!(store.bulk_recompute_calls(), 0);
    assert_eq!(tracker.snapshot().phase, ProgressPhase::Completed);
}

#[tokio::test]
async fn test_progress_is_reported_per_match() {
    let store = Arc::new(InMemoryScoringStore::new());
    for round in 1..=3 {
        add_finished_match(&store, round, 0, round);
    }
    let (service, tracker) = batch_service(store.clone(), Duration::from_secs(5));

    service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap();

    let settling: Vec<(usize, usize)> = tracker
        .history()
        .iter()
        .filter(|u| u.phase == ProgressPhase::SettlingMatch)
        .map(|u| (u.current, u.total))
        .collect();
    assert_eq!(settling, vec![(1, 3), (2, 3), (3, 3)]);

    let history = tracker.history();
    assert_eq!(history.first().map(|u| u.phase), Some(ProgressPhase::Starting));
    assert!(history.iter().any(|u| u.phase == ProgressPhase::RecomputingTotals));
    assert_eq!(tracker.snapshot().phase, ProgressPhase::Completed);
    assert!(tracker.snapshot().phase.is_terminal());
}

#[tokio::test]
async fn test_failing_and_slow_matches_do_not_abort_the_batch() {
    let store = Arc::new(InMemoryScoringStore::new());
    let user = add_user(&store, "steady");

    let broken = add_finished_match(&store, 1, 0, 1);
    let slow = add_finished_match(&store, 2, 0, 2);
    let healthy = add_finished_match(&store, 0, 1, 3);
    add_prediction(&store, user, broken, 1, 0);
    let slow_prediction = add_prediction(&store, user, slow, 2, 0);
    let healthy_prediction = add_prediction(&store, user, healthy, 0, 1);

    store.fail_match(broken);
    store.delay_match(slow, Duration::from_millis(500));

    let (service, tracker) = batch_service(store.clone(), Duration::from_millis(100));
    let summary = service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap();

    assert_eq!(summary.matches_processed, 1);
    assert_eq!(summary.per_match_errors.len(), 2);
    assert!(summary.per_match_errors.iter().all(|e| e.kind == "persistence_failure"));
    assert_eq!(points_of(&store, slow_prediction), None);
    assert_eq!(points_of(&store, healthy_prediction), Some(3));
    assert_eq!(store.user_points(user), Some(3));
    assert_eq!(tracker.snapshot().phase, ProgressPhase::CompletedWithErrors);
}

#[tokio::test]
async fn test_cancelled_batch_stops_between_matches() {
    let store = Arc::new(InMemoryScoringStore::new());
    let user = add_user(&store, "quitter");
    let match_id = add_finished_match(&store, 1, 1, 1);
    let prediction = add_prediction(&store, user, match_id, 1, 1);

    let cancel = CancellationFlag::new();
    cancel.cancel();

    let (service, tracker) = batch_service(store.clone(), Duration::from_secs(5));
    let summary = service.settle_all_finished_matches(&cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.outcome, BatchOutcome::Cancelled);
    assert_eq!(summary.matches_processed, 0);
    assert_eq!(points_of(&store, prediction), None);
    // Totals still reflect what is settled
    assert_eq!(store.bulk_recompute_calls(), 1);
    assert_eq!(tracker.snapshot().phase, ProgressPhase::Cancelled);
}

#[tokio::test]
async fn test_unreachable_store_fails_the_whole_run() {
    let store = Arc::new(InMemoryScoringStore::new());
    add_finished_match(&store, 1, 0, 1);
    store.set_unavailable(true);

    let (service, tracker) = batch_service(store.clone(), Duration::from_secs(5));
    let err = service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap_err();

    assert_eq!(err.kind(), "persistence_failure");
    assert_eq!(tracker.snapshot().phase, ProgressPhase::Failed);
}

#[tokio::test]
async fn test_rerunning_the_batch_is_idempotent() {
    let store = Arc::new(InMemoryScoringStore::new());
    let users: Vec<Uuid> = (0..4).map(|i| add_user(&store, &format!("user{}", i))).collect();
    let first = add_finished_match(&store, 3, 2, 1);
    let second = add_finished_match(&store, 0, 1, 2);
    for (i, user) in users.iter().enumerate() {
        let i = i as i32;
        add_prediction(&store, *user, first, i, 2);
        add_prediction(&store, *user, second, 0, i);
    }

    let (service, _) = batch_service(store.clone(), Duration::from_secs(5));
    service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap();
    let totals: Vec<Option<i32>> = users.iter().map(|u| store.user_points(*u)).collect();

    service.settle_all_finished_matches(&CancellationFlag::new()).await.unwrap();
    let rerun: Vec<Option<i32>> = users.iter().map(|u| store.user_points(*u)).collect();

    assert_eq!(totals, rerun);
    for user in &users {
        assert_eq!(store.user_points(*user), Some(expected_total(&store, *user)));
    }
}

#[tokio::test]
async fn test_cancel_during_a_match_stops_before_the_next_one() {
    let store = Arc::new(InMemoryScoringStore::new());
    let user = add_user(&store, "patient");

    let first = add_finished_match(&store, 1, 0, 1);
    let second = add_finished_match(&store, 2, 2, 2);
    let third = add_finished_match(&store, 0, 3, 3);
    let first_prediction = add_prediction(&store, user, first, 1, 0);
    let second_prediction = add_prediction(&store, user, second, 1, 1);
    let third_prediction = add_prediction(&store, user, third, 0, 3);
    store.delay_match(second, Duration::from_millis(300));

    let (service, tracker) = batch_service(store.clone(), Duration::from_secs(5));
    let service = Arc::new(service);
    let cancel = CancellationFlag::new();

    let run = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.settle_all_finished_matches(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let summary = run.await.expect("Batch task panicked").expect("Batch should complete");

    assert!(summary.cancelled);
    assert_eq!(summary.outcome, BatchOutcome::Cancelled);
    assert_eq!(summary.matches_processed, 2);
    assert_eq!(points_of(&store, first_prediction), Some(3));
    assert_eq!(points_of(&store, second_prediction), Some(1));
    assert_eq!(points_of(&store, third_prediction), None);
    assert_eq!(store.bulk_recompute_calls(), 1);
    assert_eq!(store.user_points(user), Some(4));
    assert_eq!(tracker.snapshot().phase, ProgressPhase::Cancelled);
}

#[tokio::test]
async fn test_second_run_is_refused_and_keeps_the_pending_cancel() {
    let (store, scoring) = scoring_service();
    for round in 1..=4 {
        let match_id = add_finished_match(&store, 1, 0, round);
        store.delay_match(match_id, Duration::from_millis(300));
    }

    let first_run = {
        let scoring = scoring.clone();
        tokio::spawn(async move { scoring.settle_all_finished_matches().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    scoring.cancel_batch();

    let second_run = scoring.settle_all_finished_matches().await;
    assert!(matches!(second_run, Err(ScoringError::AlreadyRunning)));
    assert!(matches!(scoring.recompute_all_users().await, Err(ScoringError::AlreadyRunning)));

    let summary = first_run.await.expect("Batch task panicked").expect("First run should complete");
    assert!(summary.cancelled);
    assert_eq!(summary.outcome, BatchOutcome::Cancelled);
    assert_eq!(summary.matches_processed, 1);
    assert_eq!(store.bulk_recompute_calls(), 1);
    assert_eq!(scoring.progress().phase, ProgressPhase::Cancelled);

    // Once the first run is over a new one starts with a cleared flag
    let rerun = scoring.settle_all_finished_matches().await.expect("Rerun should be accepted");
    assert_eq!(rerun.outcome, BatchOutcome::Completed);
    assert_eq!(rerun.matches_processed, 4);
}
