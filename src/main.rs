use std::net::TcpListener;
use std::sync::Arc;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use prode_scoring::run;
use prode_scoring::config::settings::get_config;
use prode_scoring::db::{InMemoryScoringStore, PgScoringStore, ScoringStore};
use prode_scoring::services::{RedisEventPublisher, SchedulerService, ScoringService};
use prode_scoring::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = get_config()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Failed to read the config: {}", e)))?;

    let subscriber = get_subscriber(
        "prode-scoring".into(),
        config.application.log_level.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber);

    let store: Arc<dyn ScoringStore> = if config.scoring.in_memory_store {
        tracing::warn!("Using the in-memory store, nothing will be persisted");
        Arc::new(InMemoryScoringStore::new())
    } else {
        // Only try to establish connection when actually used
        let connection_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_lazy(config.database.connection_string().expose_secret())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Arc::new(PgScoringStore::new(connection_pool))
    };

    // Redis is optional, scoring events are only published when it is configured
    let publisher = match &config.redis {
        Some(redis_settings) => match RedisEventPublisher::new(redis_settings) {
            Ok(publisher) => Some(publisher),
            Err(e) => {
                tracing::error!("Failed to create Redis client: {}. Scoring events will not be published.", e);
                None
            }
        },
        None => None,
    };

    let scoring_service = Arc::new(ScoringService::new(store, &config.scoring, publisher));

    let scheduler_service = SchedulerService::new(scoring_service.clone())
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    if let Some(cron_expr) = &config.scoring.recalculation_cron {
        scheduler_service
            .schedule_recalculation(cron_expr)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    }
    scheduler_service
        .start()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let address = format!("{}:{}", config.application.host, config.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("🚀 Listening on {}", address);

    run(
        listener,
        scoring_service,
        config.application.allowed_origins.clone(),
    )?.await?;

    if let Err(e) = scheduler_service.stop().await {
        tracing::error!("❌ Failed to stop scheduler: {}", e);
    }
    Ok(())
}
