pub mod admin;
pub mod backend_health_handler;
pub mod leaderboard_handler;
