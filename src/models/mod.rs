pub mod common;
pub mod fixture;
pub mod prediction;
pub mod profile;
pub mod scoring_events;
