pub mod scoring_handler;
