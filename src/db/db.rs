// db/db.rs
use redis::aio::ConnectionManager;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub redis_client: Option<Arc<ConnectionManager>>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("redis_client", &self.redis_client.is_some())
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            redis_client: None,
        }
    }

    /// PostgreSQL plus Redis; falls back to no Redis when it cannot connect.
    pub async fn with_redis(pool: Pool<Postgres>, redis_url: &str) -> Self {
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("Redis connection established");
                    DBClient {
                        pool,
                        redis_client: Some(Arc::new(conn)),
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to connect to Redis: {}. Continuing without token blacklist.", e);
                    DBClient::new(pool)
                }
            },
            Err(e) => {
                tracing::warn!("Failed to create Redis client: {}. Continuing without token blacklist.", e);
                DBClient::new(pool)
            }
        }
    }

    pub fn is_redis_available(&self) -> bool {
        self.redis_client.is_some()
    }

    pub fn cache_status(&self) -> &str {
        if self.redis_client.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    }
}
