use redis::RedisResult;

/// Outcome of one fixed-window rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub count: i64,
    pub limit: i64,
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub fn rate_limit_key(subject: &str) -> String {
        format!("tourbook:ratelimit:{}", subject)
    }

    /// Counts one hit for `subject` in the current window.
    ///
    /// The window starts at the first hit. `SET NX EX` opens it with its TTL
    /// and INCR keeps that TTL, so later hits never extend the window. Both go
    /// out as one MULTI block so a counter never exists without a TTL.
    pub async fn check_rate_limit(
        &self,
        subject: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<RateDecision> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::rate_limit_key(subject);

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(window_seconds)
            .ignore()
            .incr(&key, 1)
            .query_async(&mut conn)
            .await?;

        Ok(RateDecision {
            allowed: count <= limit,
            count,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key_is_namespaced() {
        assert_eq!(RedisClient::rate_limit_key("10.0.0.1"), "tourbook:ratelimit:10.0.0.1");
    }

    #[test]
    fn test_open_does_not_connect() {
        // Parsing only; the connection is made on first use.
        assert!(RedisClient::new("redis://127.0.0.1:6399/").is_ok());
        assert!(RedisClient::new("not a url").is_err());
    }

    // Run with a local Redis: `cargo test -p tourbook-store -- --ignored`.
    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL or 127.0.0.1:6379"]
    async fn test_window_is_not_extended_by_later_hits() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string());
        let redis = RedisClient::new(&url).unwrap();
        let subject = uuid::Uuid::new_v4().to_string();

        let first = redis.check_rate_limit(&subject, 2, 1).await.unwrap();
        assert_eq!(first.count, 1);
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;

        let second = redis.check_rate_limit(&subject, 2, 1).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(second.allowed);

        let mut conn = redis.client.get_multiplexed_async_connection().await.unwrap();
        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(RedisClient::rate_limit_key(&subject))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(ttl_ms > 0 && ttl_ms <= 400, "window was extended: {}ms left", ttl_ms);

        // 1.2s after the first hit the window has closed, even though the
        // second hit was only 0.6s ago.
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        let third = redis.check_rate_limit(&subject, 2, 1).await.unwrap();
        assert_eq!(third.count, 1);
        assert!(third.allowed);
    }
}
