//! Process configuration read from the environment (after `.env` is loaded).

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub bind_addr: SocketAddr,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub renewal_scheduler_interval: Duration,
    pub anthropic_api_key: Option<SecretString>,
    pub anthropic_model: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: SecretString::from(required("JWT_SECRET")?),
            bind_addr: parse_or(var("BIND_ADDR"), "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            database_max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or(var("RUN_MIGRATIONS"), "RUN_MIGRATIONS", true)?,
            renewal_scheduler_interval: Duration::from_secs(parse_or(
                var("RENEWAL_SCHEDULER_INTERVAL_SECS"),
                "RENEWAL_SCHEDULER_INTERVAL_SECS",
                3600,
            )?),
            anthropic_api_key: var("ANTHROPIC_API_KEY").map(SecretString::from),
            anthropic_model: var("ANTHROPIC_MODEL"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.run_migrations);
        assert_eq!(config.renewal_scheduler_interval, Duration::from_secs(3600));
        assert!(config.anthropic_api_key.is_none());
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(config.jwt_secret.expose_secret(), "s");
    }

    #[test]
    fn test_missing_and_invalid() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("RUN_MIGRATIONS", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RUN_MIGRATIONS", .. }));
    }

    #[test]
    fn test_cors_origins_split() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(config.cors_allowed_origins, vec!["https://a.example", "https://b.example"]);
    }
}
