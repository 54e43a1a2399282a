use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum transport session lifetime in seconds. Bounds the TTL on
    /// connection and subscription rows.
    pub session_ttl_secs: u64,
    /// Grace period before follower rows of an inactive thread expire.
    pub follower_cleanup_ttl_secs: u64,
    /// Default page size for notification listings.
    pub notification_page_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Config {
            session_ttl_secs: parse_var("SESSION_TTL_SECS", 2 * 60 * 60)?,
            follower_cleanup_ttl_secs: parse_var("FOLLOWER_CLEANUP_TTL_SECS", 7 * 24 * 60 * 60)?,
            notification_page_size: parse_var("NOTIFICATION_PAGE_SIZE", 50)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_ttl_secs: 2 * 60 * 60,
            follower_cleanup_ttl_secs: 7 * 24 * 60 * 60,
            notification_page_size: 50,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session_ttl_secs, 7200);
        assert_eq!(config.notification_page_size, 50);
    }
}
