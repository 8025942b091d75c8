//! Process configuration, read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use gymhub_observability::LogFormat;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORAGE_BASE_URL: &str = "memory://uploads";
pub const DEFAULT_BCRYPT_COST: u32 = 12;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub log_format: LogFormat,
    pub storage_base_url: String,
    pub bcrypt_cost: u32,
    /// Only consulted when built with the `postgres` feature; otherwise the
    /// in-memory store is used.
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("GYMHUB_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "GYMHUB_BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let log_format = match get("GYMHUB_LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e: gymhub_observability::UnknownLogFormat| ConfigError::Invalid {
                key: "GYMHUB_LOG_FORMAT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => LogFormat::default(),
        };

        let bcrypt_cost = match get("GYMHUB_BCRYPT_COST") {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "GYMHUB_BCRYPT_COST",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_BCRYPT_COST,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            log_format,
            storage_base_url: get("GYMHUB_STORAGE_BASE_URL").unwrap_or_else(|| DEFAULT_STORAGE_BASE_URL.to_string()),
            bcrypt_cost,
            database_url: get("DATABASE_URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.jwt_secret, "dev-secret");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.storage_base_url, "memory://uploads");
        assert_eq!(cfg.bcrypt_cost, 12);
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn reads_every_key() {
        let cfg = config(&[
            ("GYMHUB_BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("GYMHUB_LOG_FORMAT", "pretty"),
            ("GYMHUB_STORAGE_BASE_URL", "https://cdn.example.com"),
            ("GYMHUB_BCRYPT_COST", "6"),
            ("DATABASE_URL", "postgres://localhost/gymhub"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.storage_base_url, "https://cdn.example.com");
        assert_eq!(cfg.bcrypt_cost, 6);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/gymhub"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("JWT_SECRET", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(cfg.jwt_secret, "dev-secret");
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn malformed_values_name_the_key() {
        let err = config(&[("GYMHUB_BCRYPT_COST", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "GYMHUB_BCRYPT_COST", .. }));

        let err = config(&[("GYMHUB_BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "GYMHUB_BIND_ADDR", .. }));

        let err = config(&[("GYMHUB_LOG_FORMAT", "xml")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "GYMHUB_LOG_FORMAT", .. }));
    }
}
