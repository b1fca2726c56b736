pub mod error;
pub mod rule_evaluator;

pub use error::{InvalidStateReason, ScoringError, StoreError};
pub use rule_evaluator::{evaluate, Outcome, EXACT_SCORE_POINTS, NONE_POINTS, RESULT_POINTS};
