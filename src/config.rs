//! Platform configuration

use crate::{PlatformError, Result};
use moderation::reporting::MAX_PAGE_SIZE;
use storage::DatabaseConfig;

/// Environment variable naming the SQLite database file
pub const ENV_DATABASE_PATH: &str = "THREADLINE_DATABASE_PATH";
/// Environment variable for the connection pool size
pub const ENV_MAX_CONNECTIONS: &str = "THREADLINE_MAX_CONNECTIONS";
/// Environment variable for the report page-size cap
pub const ENV_MAX_PAGE_SIZE: &str = "THREADLINE_MAX_PAGE_SIZE";

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Database settings
    pub database: DatabaseConfig,
    /// Largest report page a moderator may request
    pub max_page_size: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self { database: DatabaseConfig::default(), max_page_size: MAX_PAGE_SIZE }
    }
}

impl PlatformConfig {
    /// Configuration for a database file, everything else default
    pub fn new(database_path: impl Into<String>) -> Self {
        Self { database: DatabaseConfig::new(database_path), ..Default::default() }
    }

    /// Set the database file
    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.database.path = path.into();
        self
    }

    /// Replace the database settings
    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// Set the report page-size cap
    pub fn max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max;
        self
    }

    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through a lookup function
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            config.database.path = path;
        }
        if let Some(max) = lookup(ENV_MAX_CONNECTIONS) {
            config.database.max_connections = parse_positive(ENV_MAX_CONNECTIONS, &max)?;
        }
        if let Some(max) = lookup(ENV_MAX_PAGE_SIZE) {
            config.max_page_size = parse_positive(ENV_MAX_PAGE_SIZE, &max)?;
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(PlatformError::Config(format!(
            "{} must be a positive integer, got {:?}",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = PlatformConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database.path, "threadline.db");
        assert_eq!(config.max_page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_env_overrides() {
        let config = PlatformConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/var/lib/threadline/app.db"),
            (ENV_MAX_CONNECTIONS, "4"),
            (ENV_MAX_PAGE_SIZE, "25"),
        ]))
        .unwrap();

        assert_eq!(config.database.path, "/var/lib/threadline/app.db");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.max_page_size, 25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PlatformConfig::from_lookup(lookup(&[(ENV_MAX_PAGE_SIZE, "0")])).is_err());
        assert!(PlatformConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "many")])).is_err());
    }

    #[test]
    fn test_builder() {
        let config = PlatformConfig::new("a.db").max_page_size(50).database_path("b.db");
        assert_eq!(config.database.path, "b.db");
        assert_eq!(config.max_page_size, 50);
    }
}
