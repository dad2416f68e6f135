//! Configuration types and loading for formcalc.
//!
//! The main entry point is [`FormcalcConfig`], which represents the contents
//! of `.formcalc/config.yaml`. Configuration is loaded with [`load_config`]
//! (or [`load_config_file`] for an explicit path) and saved with
//! [`save_config`].
//!
//! Loading layers three sources, later ones winning:
//! 1. built-in defaults,
//! 2. the YAML file, if it exists,
//! 3. `FORMCALC_*` environment variables, nested keys separated by `__`
//!    (e.g. `FORMCALC_DISPLAY__PRECISION=3`).

use std::collections::HashSet;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "FORMCALC_";

/// Name of the configuration file inside the `.formcalc/` directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Highest display precision accepted.
const MAX_PRECISION: usize = 15;

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// The layered configuration could not be extracted.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// The configuration could not be serialized to YAML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// A calculated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field identifier in the submission.
    pub name: String,

    /// Formula computing the field. A field without one stays empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Human-readable label used in CLI output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldConfig {
    /// The label, falling back to the field name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Narrows the built-in callables formulas may reach.
///
/// `None` exposes every built-in of that kind; an empty list exposes none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructors: Option<Vec<String>>,
}

/// Display settings for rendered results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Maximum number of decimals shown for numbers.
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
        }
    }
}

fn default_precision() -> usize {
    2
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level: `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The full formcalc configuration, corresponding to `.formcalc/config.yaml`.
///
/// All sections use `serde` defaults so that a partially-specified file
/// deserializes with sensible default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FormcalcConfig {
    /// Calculated fields, evaluated in this order.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,

    /// Callable allowlist.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Display settings.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl FormcalcConfig {
    /// Look up a calculated field by name.
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an empty or duplicated field
    /// name, a precision above 15, or an unknown log level.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("fields[{}].name", i),
                    reason: "field name is empty".to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("fields[{}].name", i),
                    reason: format!("field '{}' is defined more than once", field.name),
                });
            }
        }

        if self.display.precision > MAX_PRECISION {
            return Err(ConfigError::InvalidValue {
                key: "display.precision".to_string(),
                reason: format!("must be at most {}", MAX_PRECISION),
            });
        }

        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "log.level".to_string(),
                reason: format!(
                    "unknown level '{}' (expected one of: {})",
                    self.log.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load configuration from `config.yaml` inside the given `.formcalc/` directory.
///
/// If the file does not exist, defaults (plus environment overrides) are
/// returned.
pub fn load_config(config_dir: &Path) -> Result<FormcalcConfig> {
    load_config_file(Some(&config_dir.join(CONFIG_FILE_NAME)))
}

/// Load configuration from an explicit file path, or from defaults and the
/// environment alone when `path` is `None`.
///
/// # Errors
///
/// Returns [`ConfigError::Load`] if the file or an environment value cannot
/// be deserialized, or [`ConfigError::InvalidValue`] if validation fails.
pub fn load_config_file(path: Option<&Path>) -> Result<FormcalcConfig> {
    let mut figment = Figment::from(Serialized::defaults(FormcalcConfig::default()));

    if let Some(path) = path {
        if path.is_file() {
            debug!(?path, "loading config file");
            figment = figment.merge(Yaml::file(path));
        } else {
            debug!(?path, "config file not found, using defaults");
        }
    }

    let config: FormcalcConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to `config.yaml` inside the given `.formcalc/` directory.
///
/// The directory is created if it does not exist.
pub fn save_config(config_dir: &Path, config: &FormcalcConfig) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(config_path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
fields:
  - name: total
    formula: "sum([$price, $shipping])"
    label: Order total
  - name: notes
display:
  precision: 3
"#;

    #[test]
    fn test_default_config() {
        let cfg = FormcalcConfig::default();
        assert!(cfg.fields.is_empty());
        assert_eq!(cfg.display.precision, 2);
        assert_eq!(cfg.log.level, "warn");
        assert!(cfg.registry.functions.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config_returns_default() {
        Jail::expect_with(|jail| {
            let cfg = load_config(&jail.directory().join(".formcalc")).unwrap();
            assert_eq!(cfg, FormcalcConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_yaml_file() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".formcalc")).unwrap();
            jail.create_file(".formcalc/config.yaml", SAMPLE)?;
            let cfg = load_config(&jail.directory().join(".formcalc")).unwrap();

            assert_eq!(cfg.fields.len(), 2);
            assert_eq!(cfg.fields[0].formula.as_deref(), Some("sum([$price, $shipping])"));
            assert_eq!(cfg.fields[0].display_name(), "Order total");
            assert_eq!(cfg.fields[1].formula, None);
            assert_eq!(cfg.fields[1].display_name(), "notes");
            assert_eq!(cfg.display.precision, 3);
            // Untouched sections keep their defaults.
            assert_eq!(cfg.log.level, "warn");
            assert!(cfg.field("total").is_some());
            assert!(cfg.field("missing").is_none());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", SAMPLE)?;
            jail.set_env("FORMCALC_DISPLAY__PRECISION", 5);
            jail.set_env("FORMCALC_LOG__LEVEL", "debug");
            let cfg = load_config_file(Some(&jail.directory().join("config.yaml"))).unwrap();

            assert_eq!(cfg.display.precision, 5);
            assert_eq!(cfg.log.level, "debug");
            assert_eq!(cfg.fields.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_yaml_is_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "fields: {not: [a list")?;
            let err = load_config_file(Some(&jail.directory().join("config.yaml"))).unwrap_err();
            assert!(matches!(err, ConfigError::Load(_)));
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let mut cfg = FormcalcConfig::default();
        for _ in 0..2 {
            cfg.fields.push(FieldConfig {
                name: "total".into(),
                formula: None,
                label: None,
            });
        }
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration value for key 'fields[1].name': field 'total' is defined more than once"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = FormcalcConfig::default();
        cfg.display.precision = 16;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { key, .. }) if key == "display.precision"));

        let mut cfg = FormcalcConfig::default();
        cfg.log.level = "loud".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { key, .. }) if key == "log.level"));

        let mut cfg = FormcalcConfig::default();
        cfg.fields.push(FieldConfig {
            name: " ".into(),
            formula: None,
            label: None,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_roundtrip_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".formcalc");

        let mut cfg = FormcalcConfig::default();
        cfg.fields.push(FieldConfig {
            name: "nights".into(),
            formula: Some("days_between($arrival, $departure)".into()),
            label: None,
        });
        cfg.registry.constructors = Some(vec![]);
        save_config(&config_dir, &cfg).unwrap();

        let raw = std::fs::read_to_string(config_dir.join(CONFIG_FILE_NAME)).unwrap();
        let loaded: FormcalcConfig = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(loaded, cfg);
    }
}
