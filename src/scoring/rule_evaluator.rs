use serde::{Deserialize, Serialize};

pub const EXACT_SCORE_POINTS: i32 = 3;
pub const RESULT_POINTS: i32 = 1;
pub const NONE_POINTS: i32 = 0;

/// Result of a match from the home side's perspective.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub fn from_score(home: i32, away: i32) -> Self {
        match (home - away).signum() {
            1 => Outcome::HomeWin,
            0 => Outcome::Draw,
            _ => Outcome::AwayWin,
        }
    }
}

/// Points earned by a prediction against the real score.
///
/// Exact scoreline earns [`EXACT_SCORE_POINTS`]; the right outcome (home win,
/// draw or away win) with a wrong scoreline earns [`RESULT_POINTS`];
/// anything else earns [`NONE_POINTS`].
pub fn evaluate(actual_home: i32, actual_away: i32, predicted_home: i32, predicted_away: i32) -> i32 {
    if predicted_home == actual_home && predicted_away == actual_away {
        return EXACT_SCORE_POINTS;
    }

    if Outcome::from_score(actual_home, actual_away) == Outcome::from_score(predicted_home, predicted_away) {
        RESULT_POINTS
    } else {
        NONE_POINTS
    }
}
