use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use secrecy::ExposeSecret;

use crate::config::redis::RedisSettings;
use crate::models::scoring_events::{ProgressUpdate, ScoringEvent};
use crate::services::progress::ProgressReporter;

pub const SCORING_EVENTS_CHANNEL: &str = "scoring:events:global";

#[derive(Debug, thiserror::Error)]
pub enum EventPublishError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Publishes scoring events for connected admin clients.
#[derive(Clone, Debug)]
pub struct RedisEventPublisher {
    client: Arc<Client>,
}

impl RedisEventPublisher {
    pub fn new(settings: &RedisSettings) -> Result<Self, EventPublishError> {
        let client = match Client::open(settings.get_redis_url().expose_secret()) {
            Ok(client) => {
                tracing::info!("Redis client created successfully");
                client
            },
            Err(e) => {
                tracing::error!("Failed to create Redis client: {}", e);
                return Err(e.into());
            }
        };
        Ok(Self { client: Arc::new(client) })
    }

    pub async fn publish(&self, event: &ScoringEvent) -> Result<(), EventPublishError> {
        let mut conn = self.client.get_async_connection().await?;
        let message = serde_json::to_string(event)?;

        let receivers: i32 = conn.publish(SCORING_EVENTS_CHANNEL, message).await?;
        tracing::debug!("📤 Published scoring event to {} subscribers", receivers);
        Ok(())
    }

    /// Publish and log failures instead of returning them.
    pub async fn publish_or_log(&self, event: &ScoringEvent) {
        if let Err(e) = self.publish(event).await {
            tracing::error!("❌ Failed to publish scoring event: {}", e);
        }
    }
}

#[async_trait]
impl ProgressReporter for RedisEventPublisher {
    async fn report(&self, update: ProgressUpdate) {
        self.publish_or_log(&ScoringEvent::SettlementProgress { progress: update }).await;
    }
}
