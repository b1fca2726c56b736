use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::store::ScoringStore;
use crate::models::fixture::{Match, MatchStatus};
use crate::models::prediction::{Prediction, PredictionPoints};
use crate::models::profile::LeaderboardEntry;
use crate::scoring::StoreError;

#[derive(Debug, Clone)]
struct Profile {
    username: Option<String>,
    points: i32,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    matches: HashMap<Uuid, Match>,
    predictions: HashMap<Uuid, Prediction>,
    profiles: HashMap<Uuid, Profile>,

    // Fault injection
    unavailable: bool,
    failing_matches: HashSet<Uuid>,
    failing_users: HashSet<Uuid>,
    slow_matches: HashMap<Uuid, Duration>,
    bulk_recompute_enabled: bool,
    bulk_recompute_fails: bool,

    // Call counters
    prediction_batches_written: usize,
    bulk_recompute_calls: usize,
    user_total_writes: usize,
}

/// Store kept entirely in process memory.
///
/// Serves local runs without Postgres and lets tests inject failures per
/// match or per user.
#[derive(Debug)]
pub struct InMemoryScoringStore {
    state: Mutex<State>,
}

impl Default for InMemoryScoringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScoringStore {
    pub fn new() -> Self {
        let state = State {
            bulk_recompute_enabled: true,
            ..State::default()
        };
        Self { state: Mutex::new(state) }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(state: &State) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::Backend("store is unreachable".to_string()));
        }
        Ok(())
    }

    pub fn insert_profile(&self, user_id: Uuid, username: impl Into<String>) {
        self.state().profiles.insert(user_id, Profile {
            username: Some(username.into()),
            points: 0,
            updated_at: None,
        });
    }

    pub fn insert_match(&self, game: Match) {
        self.state().matches.insert(game.id, game);
    }

    pub fn remove_match(&self, match_id: Uuid) -> Option<Match> {
        let mut state = self.state();
        state.predictions.retain(|_, p| p.match_id != match_id);
        state.matches.remove(&match_id)
    }

    /// Insert a prediction, rejecting a second guess for the same (user, match).
    pub fn insert_prediction(&self, prediction: Prediction) -> Result<(), StoreError> {
        let mut state = self.state();
        let duplicate = state.predictions.values().any(|p| {
            p.user_id == prediction.user_id && p.match_id == prediction.match_id && p.id != prediction.id
        });
        if duplicate {
            return Err(StoreError::Backend(format!(
                "user {} already predicted match {}",
                prediction.user_id, prediction.match_id
            )));
        }
        state.predictions.insert(prediction.id, prediction);
        Ok(())
    }

    pub fn prediction(&self, prediction_id: Uuid) -> Option<Prediction> {
        self.state().predictions.get(&prediction_id).cloned()
    }

    pub fn predictions_for_user(&self, user_id: Uuid) -> Vec<Prediction> {
        self.state()
            .predictions
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn user_points(&self, user_id: Uuid) -> Option<i32> {
        self.state().profiles.get(&user_id).map(|p| p.points)
    }

    /// Overwrite a cached total directly, e.g. to simulate drift.
    pub fn set_user_points(&self, user_id: Uuid, points: i32) {
        if let Some(profile) = self.state().profiles.get_mut(&user_id) {
            profile.points = points;
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn fail_match(&self, match_id: Uuid) {
        self.state().failing_matches.insert(match_id);
    }

    pub fn fail_user_writes(&self, user_id: Uuid) {
        self.state().failing_users.insert(user_id);
    }

    pub fn delay_match(&self, match_id: Uuid, delay: Duration) {
        self.state().slow_matches.insert(match_id, delay);
    }

    pub fn set_bulk_recompute_enabled(&self, enabled: bool) {
        self.state().bulk_recompute_enabled = enabled;
    }

    pub fn set_bulk_recompute_fails(&self, fails: bool) {
        self.state().bulk_recompute_fails = fails;
    }

    pub fn prediction_batches_written(&self) -> usize {
        self.state().prediction_batches_written
    }

    pub fn bulk_recompute_calls(&self) -> usize {
        self.state().bulk_recompute_calls
    }

    pub fn user_total_writes(&self) -> usize {
        self.state().user_total_writes
    }

    fn sum_for(state: &State, user_id: Uuid) -> i64 {
        state
            .predictions
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| p.points_awarded)
            .map(i64::from)
            .sum()
    }
}

#[async_trait]
impl ScoringStore for InMemoryScoringStore {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>, StoreError> {
        let state = self.state();
        Self::check_available(&state)?;
        Ok(state.matches.get(&match_id).cloned())
    }

    async fn list_finished_matches(&self) -> Result<Vec<Match>, StoreError> {
        let state = self.state();
        Self::check_available(&state)?;
        let mut games: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Finished)
            .cloned()
            .collect();
        games.sort_by(|a, b| {
            a.round
                .cmp(&b.round)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.id.cmp(&b.id))
        });
        Ok(games)
    }

    async fn list_predictions(&self, match_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        let delay = {
            let state = self.state();
            Self::check_available(&state)?;
            if state.failing_matches.contains(&match_id) {
                return Err(StoreError::Backend(format!("predictions for match {} are unreadable", match_id)));
            }
            state.slow_matches.get(&match_id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        let mut predictions: Vec<Prediction> = state
            .predictions
            .values()
            .filter(|p| p.match_id == match_id)
            .cloned()
            .collect();
        predictions.sort_by_key(|p| p.created_at);
        Ok(predictions)
    }

    async fn write_prediction_points(&self, points: &[PredictionPoints]) -> Result<u64, StoreError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        if points.is_empty() {
            return Ok(0);
        }
        state.prediction_batches_written += 1;

        let mut touched = 0;
        for entry in points {
            if let Some(prediction) = state.predictions.get_mut(&entry.prediction_id) {
                prediction.points_awarded = Some(entry.points);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn sum_points_for_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let state = self.state();
        Self::check_available(&state)?;
        Ok(Self::sum_for(&state, user_id))
    }

    async fn write_user_total_points(&self, user_id: Uuid, total: i64) -> Result<(), StoreError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        if state.failing_users.contains(&user_id) {
            return Err(StoreError::Backend(format!("write rejected for profile {}", user_id)));
        }
        let points = i32::try_from(total)
            .map_err(|_| StoreError::Backend(format!("total {} out of range", total)))?;
        state.user_total_writes += 1;
        match state.profiles.get_mut(&user_id) {
            Some(profile) => {
                profile.points = points;
                profile.updated_at = Some(Utc::now());
                Ok(())
            }
            None => Err(StoreError::Backend(format!("profile {} does not exist", user_id))),
        }
    }

    async fn list_all_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state();
        Self::check_available(&state)?;
        let mut ids: Vec<Uuid> = state.profiles.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn supports_bulk_recompute(&self) -> bool {
        self.state().bulk_recompute_enabled
    }

    async fn recompute_all_user_totals(&self) -> Result<u64, StoreError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        if !state.bulk_recompute_enabled {
            return Err(StoreError::Unsupported { operation: "recompute_all_user_totals" });
        }
        state.bulk_recompute_calls += 1;
        if state.bulk_recompute_fails {
            return Err(StoreError::Backend("aggregate recompute rejected".to_string()));
        }

        let totals: Vec<(Uuid, i64)> = state
            .profiles
            .keys()
            .map(|id| (*id, Self::sum_for(&state, *id)))
            .collect();
        let totals = totals
            .into_iter()
            .map(|(user_id, total)| {
                i32::try_from(total)
                    .map(|points| (user_id, points))
                    .map_err(|_| StoreError::Backend(format!("total {} out of range for profile {}", total, user_id)))
            })
            .collect::<Result<Vec<(Uuid, i32)>, StoreError>>()?;
        let now = Utc::now();
        for (user_id, points) in &totals {
            if let Some(profile) = state.profiles.get_mut(user_id) {
                profile.points = *points;
                profile.updated_at = Some(now);
            }
        }
        Ok(totals.len() as u64)
    }

    async fn record_match_result(
        &self,
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    ) -> Result<Option<Match>, StoreError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        Ok(state.matches.get_mut(&match_id).map(|game| {
            game.home_score = Some(home_score);
            game.away_score = Some(away_score);
            game.status = MatchStatus::Finished;
            game.clone()
        }))
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let state = self.state();
        Self::check_available(&state)?;
        let mut entries: Vec<LeaderboardEntry> = state
            .profiles
            .iter()
            .map(|(id, profile)| LeaderboardEntry {
                user_id: *id,
                username: profile.username.clone(),
                points: profile.points,
                updated_at: profile.updated_at,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.points.cmp(&a.points).then_with(|| match (&a.username, &b.username) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.user_id.cmp(&b.user_id),
            })
        });
        entries.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(entries)
    }
}
