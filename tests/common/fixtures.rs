use chrono::{Duration, Utc};
use uuid::Uuid;

use prode_scoring::db::InMemoryScoringStore;
use prode_scoring::models::fixture::{Match, MatchStatus};
use prode_scoring::models::prediction::Prediction;

pub fn build_match(status: MatchStatus, home_score: Option<i32>, away_score: Option<i32>, round: i32) -> Match {
    Match {
        id: Uuid::new_v4(),
        home_team_id: Uuid::new_v4(),
        away_team_id: Uuid::new_v4(),
        start_time: Utc::now() - Duration::days(i64::from(10 - round.min(10))),
        status,
        home_score,
        away_score,
        round,
    }
}

/// Insert a finished match with the given real score.
pub fn add_finished_match(store: &InMemoryScoringStore, home: i32, away: i32, round: i32) -> Uuid {
    let game = build_match(MatchStatus::Finished, Some(home), Some(away), round);
    let id = game.id;
    store.insert_match(game);
    id
}

pub fn add_scheduled_match(store: &InMemoryScoringStore, round: i32) -> Uuid {
    let game = build_match(MatchStatus::Scheduled, None, None, round);
    let id = game.id;
    store.insert_match(game);
    id
}

pub fn add_user(store: &InMemoryScoringStore, username: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    store.insert_profile(user_id, format!("{}_{}", username, &user_id.to_string()[..4]));
    user_id
}

pub fn add_prediction(store: &InMemoryScoringStore, user_id: Uuid, match_id: Uuid, home: i32, away: i32) -> Uuid {
    let prediction = Prediction {
        id: Uuid::new_v4(),
        user_id,
        match_id,
        home_score: home,
        away_score: away,
        points_awarded: None,
        created_at: Utc::now(),
    };
    let id = prediction.id;
    store.insert_prediction(prediction).expect("Failed to insert prediction");
    id
}

pub fn points_of(store: &InMemoryScoringStore, prediction_id: Uuid) -> Option<i32> {
    store
        .prediction(prediction_id)
        .expect("Prediction should exist")
        .points_awarded
}

/// Sum of a user's awarded points, straight from the predictions.
pub fn expected_total(store: &InMemoryScoringStore, user_id: Uuid) -> i32 {
    store
        .predictions_for_user(user_id)
        .iter()
        .filter_map(|p| p.points_awarded)
        .sum()
}
