//! Configuration management for the server.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; documents are kept in memory when absent
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// Key the catalog document is stored under
    pub document_key: String,
    /// Interval between random stock nudges; `None` disables them
    pub perturb_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let database_max_connections: u32 = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxConnections)?;

        let document_key = lookup("DOCUMENT_KEY").unwrap_or_else(|| "doc".to_string());
        if document_key.is_empty() {
            return Err(ConfigError::EmptyDocumentKey);
        }

        let perturb_ms: u64 = lookup("PERTURB_INTERVAL_MS")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPerturbInterval)?;
        let perturb_interval = (perturb_ms > 0).then(|| Duration::from_millis(perturb_ms));

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            document_key,
            perturb_interval,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            database_max_connections: 5,
            document_key: "doc".to_string(),
            perturb_interval: Some(Duration::from_millis(8000)),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid DATABASE_MAX_CONNECTIONS value")]
    InvalidMaxConnections,

    #[error("DOCUMENT_KEY must not be empty")]
    EmptyDocumentKey,

    #[error("Invalid PERTURB_INTERVAL_MS value")]
    InvalidPerturbInterval,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.document_key, "doc");
        assert_eq!(config.perturb_interval, Some(Duration::from_secs(8)));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PORT", "8787"),
            ("DATABASE_URL", "postgres://localhost/beanline"),
            ("DOCUMENT_KEY", "catalog"),
            ("PERTURB_INTERVAL_MS", "0"),
        ])
        .unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/beanline")
        );
        assert_eq!(config.document_key, "catalog");
        assert!(config.perturb_interval.is_none());
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(load(&[("PORT", "http")]), Err(ConfigError::InvalidPort)));
        assert!(matches!(
            load(&[("PERTURB_INTERVAL_MS", "-5")]),
            Err(ConfigError::InvalidPerturbInterval)
        ));
        assert!(matches!(
            load(&[("DATABASE_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::InvalidMaxConnections)
        ));
        assert!(matches!(
            load(&[("DOCUMENT_KEY", "")]),
            Err(ConfigError::EmptyDocumentKey)
        ));
    }
}
