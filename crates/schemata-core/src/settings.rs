//! Settings for schemata.
//!
//! [`Settings`] holds all runtime configuration with sensible defaults. Use
//! [`settings_loader`](crate::settings_loader) to build it from TOML, JSON,
//! or environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Data-store connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The `SQLite` database file, or `:memory:`.
    pub path: PathBuf,
}

impl DatabaseSettings {
    /// Returns `true` if the database lives in memory.
    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(":memory:")
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("schemata.sqlite3"),
        }
    }
}

/// Tunables for the registry and the instance engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Page size used when a list request does not name one.
    pub default_page_size: usize,
    /// Upper bound for any requested page size.
    pub max_page_size: usize,
    /// Time budget for a single data-store call, in milliseconds.
    pub statement_timeout_ms: u64,
}

impl EngineSettings {
    /// Returns the statement timeout as a [`Duration`].
    pub const fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            statement_timeout_ms: 5_000,
        }
    }
}

/// The complete set of settings.
///
/// # Examples
///
/// ```
/// use schemata_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.schemata.max_page_size, 100);
/// assert_eq!(settings.log_level, "info");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log filter directive (e.g. "info", "schemata_schema=debug").
    pub log_level: String,
    /// Data-store configuration.
    pub database: DatabaseSettings,
    /// Engine tunables.
    pub schemata: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            schemata: EngineSettings::default(),
        }
    }
}

impl Settings {
    /// Settings for an in-memory database, handy for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseSettings {
                path: PathBuf::from(":memory:"),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.debug);
        assert_eq!(settings.schemata.default_page_size, 20);
        assert_eq!(settings.schemata.statement_timeout(), Duration::from_secs(5));
        assert!(!settings.database.is_memory());
    }

    #[test]
    fn test_in_memory() {
        let settings = Settings::in_memory();
        assert!(settings.database.is_memory());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_serde_roundtrip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
