// db/cache.rs
use redis::{aio::ConnectionManager, AsyncCommands};
use std::sync::Arc;

const BLACKLIST_PREFIX: &str = "token_blacklist";

pub fn blacklist_key(token: &str) -> String {
    format!("{}:{}", BLACKLIST_PREFIX, token)
}

pub struct TokenBlacklist;

impl TokenBlacklist {
    /// Stores the token until it would have expired anyway.
    pub async fn revoke(
        redis: &Arc<ConnectionManager>,
        token: &str,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let _: () = conn.set_ex(blacklist_key(token), "1", ttl_seconds.max(1)).await?;
        tracing::debug!("Token revoked (TTL: {}s)", ttl_seconds);
        Ok(())
    }

    pub async fn is_revoked(redis: &Arc<ConnectionManager>, token: &str) -> bool {
        let mut conn = ConnectionManager::clone(redis);
        let exists: Result<bool, redis::RedisError> = conn.exists(blacklist_key(token)).await;
        match exists {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!("Token blacklist lookup failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_key() {
        assert_eq!(blacklist_key("abc.def"), "token_blacklist:abc.def");
    }
}
