//! Configuration types

use crate::error::{CacheResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable naming the accessor configuration file.
pub const CONFIG_ENV_VAR: &str = "KEEPSAKE_CONFIG";

/// Options accepted by `decorate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecorateOptions {
    /// Storage key; the accessor's name when absent.
    pub key: Option<String>,
    /// Consult the host's `use_cache` on every access.
    pub check_use_cache: bool,
    /// Build a property rather than a method.
    pub as_property: bool,
}

impl Default for DecorateOptions {
    fn default() -> Self {
        Self {
            key: None,
            check_use_cache: false,
            as_property: true,
        }
    }
}

impl DecorateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn check_use_cache(mut self, check: bool) -> Self {
        self.check_use_cache = check;
        self
    }

    pub fn as_property(mut self, as_property: bool) -> Self {
        self.as_property = as_property;
        self
    }

    /// Shorthand for `as_property(false)`.
    pub fn method(self) -> Self {
        self.as_property(false)
    }

    /// Validate the options.
    /// Returns Ok(()) if valid, Err(CacheError::Config) if invalid.
    pub fn validate(&self) -> CacheResult<()> {
        self.check("key")?;
        Ok(())
    }

    fn check(&self, field: &str) -> Result<(), ConfigError> {
        if let Some(key) = &self.key {
            if key.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: key.clone(),
                    reason: "key must not be blank".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// ACCESSOR CONFIGURATION FILE
// ============================================================================

/// Per-accessor options loaded from TOML.
///
/// ```toml
/// [accessors.area]
/// key = "_area"
///
/// [accessors.lookup]
/// as_property = false
/// check_use_cache = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessorConfig {
    #[serde(default)]
    pub accessors: BTreeMap<String, DecorateOptions>,
}

impl AccessorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&input)
    }

    /// Load the file named by `KEEPSAKE_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path),
            _ => Err(ConfigError::MissingConfigPath),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, options) in &self.accessors {
            options.check(&format!("accessors.{}.key", name))?;
        }
        Ok(())
    }

    /// Options configured for `name`, or the defaults.
    pub fn options_for(&self, name: &str) -> DecorateOptions {
        self.accessors.get(name).cloned().unwrap_or_default()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::io::Write;

    #[test]
    fn test_default_options_build_a_property() {
        let options = DecorateOptions::default();
        assert_eq!(options.key, None);
        assert!(!options.check_use_cache);
        assert!(options.as_property);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let options = DecorateOptions::new().key("_k").check_use_cache(true).method();
        assert_eq!(options.key.as_deref(), Some("_k"));
        assert!(options.check_use_cache);
        assert!(!options.as_property);
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let err = DecorateOptions::new().key("  ").validate().unwrap_err();
        assert!(matches!(
            err,
            CacheError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "key"
        ));
    }

    #[test]
    fn test_parse_accessor_table() {
        let config = AccessorConfig::from_toml_str(
            r#"
            [accessors.area]
            key = "_area"

            [accessors.lookup]
            as_property = false
            check_use_cache = true
            "#,
        )
        .unwrap();

        let area = config.options_for("area");
        assert_eq!(area.key.as_deref(), Some("_area"));
        assert!(area.as_property);

        let lookup = config.options_for("lookup");
        assert!(!lookup.as_property);
        assert!(lookup.check_use_cache);

        assert_eq!(config.options_for("other"), DecorateOptions::default());
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        let err = AccessorConfig::from_toml_str("[accessors.a]\nttl = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_blank_key_in_file_names_the_accessor() {
        let err = AccessorConfig::from_toml_str("[accessors.area]\nkey = \"\"\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "accessors.area.key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[accessors.total]\nkey = \"sum\"").unwrap();

        let config = AccessorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.options_for("total").key.as_deref(), Some("sum"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AccessorConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_uses_env_var() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[accessors.size]\ncheck_use_cache = true").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let loaded = AccessorConfig::load();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert!(loaded.unwrap().options_for("size").check_use_cache);
        assert_eq!(AccessorConfig::load(), Err(ConfigError::MissingConfigPath));
    }

    #[test]
    fn test_toml_round_trip_preserves_options() {
        let mut config = AccessorConfig::default();
        config
            .accessors
            .insert("m".to_string(), DecorateOptions::new().method());
        let text = config.to_toml_string().unwrap();
        assert_eq!(AccessorConfig::from_toml_str(&text).unwrap(), config);
    }
}
