//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `SCHEMATA_DEBUG` | `debug` |
//! | `SCHEMATA_LOG_LEVEL` | `log_level` |
//! | `SCHEMATA_DATABASE_PATH` | `database.path` |
//! | `SCHEMATA_DEFAULT_PAGE_SIZE` | `schemata.default_page_size` |
//! | `SCHEMATA_MAX_PAGE_SIZE` | `schemata.max_page_size` |
//! | `SCHEMATA_STATEMENT_TIMEOUT_MS` | `schemata.statement_timeout_ms` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use schemata_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("schemata.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::SchemataError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any keys not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, SchemataError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| SchemataError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, SchemataError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, SchemataError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, SchemataError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| SchemataError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, SchemataError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a file, picking the format from its extension
/// (`.json` is JSON, anything else is TOML), then applies environment overrides.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, SchemataError> {
    let path = path.as_ref();
    let mut settings = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from environment variables only (starting from defaults).
pub fn from_env() -> Result<Settings, SchemataError> {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Applies `SCHEMATA_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), SchemataError> {
    apply_overrides_from(settings, |key| std::env::var(key).ok())
}

/// Applies overrides read through `lookup`, which maps a variable name to its
/// value.
///
/// # Errors
///
/// Returns a configuration error when a numeric variable does not parse.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F) -> Result<(), SchemataError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SCHEMATA_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
    if let Some(val) = lookup("SCHEMATA_LOG_LEVEL") {
        settings.log_level = val;
    }
    if let Some(val) = lookup("SCHEMATA_DATABASE_PATH") {
        settings.database.path = PathBuf::from(val);
    }
    if let Some(val) = lookup("SCHEMATA_DEFAULT_PAGE_SIZE") {
        settings.schemata.default_page_size = parse_number("SCHEMATA_DEFAULT_PAGE_SIZE", &val)?;
    }
    if let Some(val) = lookup("SCHEMATA_MAX_PAGE_SIZE") {
        settings.schemata.max_page_size = parse_number("SCHEMATA_MAX_PAGE_SIZE", &val)?;
    }
    if let Some(val) = lookup("SCHEMATA_STATEMENT_TIMEOUT_MS") {
        settings.schemata.statement_timeout_ms =
            parse_number("SCHEMATA_STATEMENT_TIMEOUT_MS", &val)?;
    }
    validate(settings)
}

/// Checks cross-field consistency of loaded settings.
fn validate(settings: &Settings) -> Result<(), SchemataError> {
    let engine = &settings.schemata;
    if engine.max_page_size == 0 {
        return Err(SchemataError::ConfigurationError(
            "schemata.max_page_size must be at least 1".to_string(),
        ));
    }
    if engine.default_page_size == 0 || engine.default_page_size > engine.max_page_size {
        return Err(SchemataError::ConfigurationError(format!(
            "schemata.default_page_size must be between 1 and {}",
            engine.max_page_size
        )));
    }
    if engine.statement_timeout_ms == 0 {
        return Err(SchemataError::ConfigurationError(
            "schemata.statement_timeout_ms must be positive".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, SchemataError> {
    std::fs::read_to_string(path).map_err(|e| {
        SchemataError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SchemataError> {
    raw.trim()
        .parse()
        .map_err(|_| SchemataError::ConfigurationError(format!("{key} must be a number, got '{raw}'")))
}

fn merge_over_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<Settings, SchemataError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        SchemataError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    let merged = merge_json(default_json, value);
    let settings: Settings = serde_json::from_value(merged).map_err(|e| {
        SchemataError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })?;
    validate(&settings)?;
    Ok(settings)
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = true
            log_level = "debug"

            [database]
            path = "/var/lib/schemata/data.db"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.database.path, PathBuf::from("/var/lib/schemata/data.db"));
        // Defaults preserved
        assert_eq!(settings.schemata.max_page_size, 100);
    }

    #[test]
    fn test_from_toml_str_engine_section() {
        let toml = r"
            [schemata]
            max_page_size = 500
            statement_timeout_ms = 250
        ";

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.schemata.max_page_size, 500);
        assert_eq!(settings.schemata.statement_timeout_ms, 250);
        assert_eq!(settings.schemata.default_page_size, 20);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        assert!(from_toml_str("[[invalid toml content").is_err());
    }

    #[test]
    fn test_from_toml_rejects_inconsistent_page_sizes() {
        let toml = r"
            [schemata]
            default_page_size = 50
            max_page_size = 10
        ";
        let err = from_toml_str(toml).unwrap_err();
        assert!(matches!(err, SchemataError::ConfigurationError(_)));
    }

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{ "log_level": "warn", "database": { "path": ":memory:" } }"#;
        let settings = from_json_str(json).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert!(settings.database.is_memory());
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{not json").is_err());
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "log_level = \"trace\"").unwrap();
        let settings = from_toml_file(toml_file.path()).unwrap();
        assert_eq!(settings.log_level, "trace");

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json_file, "{{\"debug\": true}}").unwrap();
        let settings = from_json_file(json_file.path()).unwrap();
        assert!(settings.debug);
    }

    #[test]
    fn test_from_file_missing() {
        let err = from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read TOML file"));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SCHEMATA_DEBUG", "yes"),
            ("SCHEMATA_LOG_LEVEL", "debug"),
            ("SCHEMATA_DATABASE_PATH", ":memory:"),
            ("SCHEMATA_MAX_PAGE_SIZE", "40"),
            ("SCHEMATA_STATEMENT_TIMEOUT_MS", "100"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| vars.get(k).map(ToString::to_string)).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "debug");
        assert!(settings.database.is_memory());
        assert_eq!(settings.schemata.max_page_size, 40);
        assert_eq!(settings.schemata.statement_timeout_ms, 100);
    }

    #[test]
    fn test_overrides_reject_bad_numbers() {
        let mut settings = Settings::default();
        let err = apply_overrides_from(&mut settings, |k| {
            (k == "SCHEMATA_MAX_PAGE_SIZE").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SCHEMATA_MAX_PAGE_SIZE"));
    }

    #[test]
    fn test_merge_json_deep() {
        let base = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        let over = serde_json::json!({"b": {"c": 99}});
        let merged = merge_json(base, over);
        assert_eq!(merged, serde_json::json!({"a": 1, "b": {"c": 99, "d": 3}}));
    }
}
