use crate::config::StoreConfig;
use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Opens a managed connection, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns an error if the URL is missing or invalid, or if every connection attempt fails.
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Arc<Self>> {
        let url = config.redis_url.as_deref().context("MISSION_REDIS_URL must be set for the redis store")?;
        let client = redis::Client::open(url)?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.redis_min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.redis_max_backoff_ms))
            .with_max_times(config.redis_connect_attempts.saturating_sub(1));

        let connection = (|| async { client.get_connection_manager().await })
            .retry(retry_strategy)
            .notify(|e, duration| {
                tracing::warn!(error = %e, "Redis connection failed, retrying in {:?}", duration);
            })
            .await
            .context("Could not connect to redis")?;

        tracing::debug!("Connected to redis");
        Ok(Arc::new(Self { connection }))
    }

    /// Returns a connection handle for standard commands.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }
}
