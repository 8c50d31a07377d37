use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Extra attempts after a reservation loses a serialization race.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

fn default_conflict_retries() -> u32 { 1 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 key shared with the token issuer.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Rate limiting is disabled when unset.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Events go to the log only when empty.
    #[serde(default)]
    pub brokers: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_topic_prefix() -> String { "tourbook".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TOURBOOK_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("TOURBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    const DEFAULTS: &str = r#"
        [server]
        port = 8080

        [database]
        url = "postgres://localhost/tourbook"

        [redis]

        [kafka]

        [auth]
        jwt_secret = "secret"

        [rate_limit]
        requests = 100
        window_seconds = 60

        [business_rules]
    "#;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config: Config = config::Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.business_rules.conflict_retries, 1);
        assert_eq!(config.kafka.topic_prefix, "tourbook");
        assert!(config.kafka.brokers.is_empty());
        assert!(config.redis.url.is_none());
    }
}
