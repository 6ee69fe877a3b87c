use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub post_api_url: String,
    pub post_api_token: Option<String>,
    pub post_timeout_secs: u64,
    pub rate_limit_capacity: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_spacing_ms: u64,
    pub retry_interval_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_with_default(&env_map, "PORT", "8080")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let post_api_url = env_map
            .get("POST_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("POST_API_URL".to_string()))?;

        let post_api_token = env_map.get("POST_API_TOKEN").cloned();

        let post_timeout_secs = parse_with_default(&env_map, "POST_TIMEOUT_SECS", "10")?;

        // Provider defaults: 300 posts per 15-minute window, 1s spacing.
        let rate_limit_capacity = parse_with_default(&env_map, "RATE_LIMIT_CAPACITY", "300")?;
        let rate_limit_window_secs =
            parse_with_default(&env_map, "RATE_LIMIT_WINDOW_SECS", "900")?;
        let rate_limit_spacing_ms = parse_with_default(&env_map, "RATE_LIMIT_SPACING_MS", "1000")?;

        let retry_interval_secs = parse_with_default(&env_map, "RETRY_INTERVAL_SECS", "3600")?;

        if rate_limit_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            post_api_url,
            post_api_token,
            post_timeout_secs,
            rate_limit_capacity,
            rate_limit_window_secs,
            rate_limit_spacing_ms,
            retry_interval_secs,
        })
    }
}

fn parse_with_default<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("must be a valid {}", std::any::type_name::<T>()),
            )
        })
}
