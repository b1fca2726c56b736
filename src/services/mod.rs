pub mod batch_settlement_service;
pub mod match_settlement_service;
pub mod progress;
pub mod redis_service;
pub mod scheduler;
pub mod scoring_service;
pub mod user_points_service;

pub use batch_settlement_service::BatchSettlementService;
pub use match_settlement_service::MatchSettlementService;
pub use redis_service::RedisEventPublisher;
pub use scheduler::SchedulerService;
pub use scoring_service::ScoringService;
pub use user_points_service::UserPointsService;
