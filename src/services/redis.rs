//! Redis service for cached dashboards, trending lists and recommendations

use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    /// Read a cached JSON value; a payload that no longer parses counts as a miss
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read {} from Redis: {}", key, e)))?;

        Ok(payload.and_then(|p| match serde_json::from_str(&p) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }))
    }

    /// Store a JSON value with expiration (in seconds)
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        expiration_seconds: u64,
    ) -> AppResult<()> {
        let payload = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Failed to serialize cache entry: {}", e)))?;

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, payload, expiration_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store {} in Redis: {}", key, e)))?;

        Ok(())
    }

    /// Delete every key matching a glob pattern; returns the number removed
    pub async fn delete_matching(&self, pattern: &str) -> AppResult<usize> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list Redis keys: {}", e)))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: usize = conn
            .del(&keys)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete Redis keys: {}", e)))?;

        Ok(removed)
    }
}

/// Cache read that treats an unavailable or failing Redis as a miss
pub async fn cache_get<T: DeserializeOwned>(redis: Option<&RedisService>, key: &str) -> Option<T> {
    let redis = redis?;
    match redis.get_json(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Cache read failed for {}: {}", key, e);
            None
        }
    }
}

/// Best-effort cache write
pub async fn cache_put<T: Serialize + Sync>(
    redis: Option<&RedisService>,
    key: &str,
    value: &T,
    expiration_seconds: u64,
) {
    if let Some(redis) = redis {
        if let Err(e) = redis.set_json(key, value, expiration_seconds).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }
}
