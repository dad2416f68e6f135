//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] holds all the state a command handler needs: the
//! global flags, the loaded configuration and the path it came from.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use formcalc_config::config::{FormcalcConfig, load_config_file};
use formcalc_config::config_dir::resolve_config_path;
use formcalc_formula::{CalculatedField, StaticRegistry, builtins};
use formcalc_ui::PlainRenderer;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Config file in effect, if any was found or given.
    pub config_path: Option<PathBuf>,

    /// The loaded configuration (defaults when no file exists).
    pub config: FormcalcConfig,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments.
    ///
    /// `--config` wins; otherwise `.formcalc/config.yaml` is discovered from
    /// the working directory. An explicit path that does not exist is an
    /// error, a missing discovered file just means defaults.
    pub fn from_global_args(global: &GlobalArgs) -> Result<Self> {
        if let Some(path) = &global.config {
            if !path.is_file() {
                anyhow::bail!("config file not found: {}", path.display());
            }
        }

        let cwd = std::env::current_dir().context("failed to determine working directory")?;
        let config_path = resolve_config_path(global.config.as_deref(), &cwd);
        let config = load_config_file(config_path.as_deref()).with_context(|| match &config_path {
            Some(path) => format!("failed to load {}", path.display()),
            None => "failed to load configuration".to_string(),
        })?;

        Ok(Self {
            config_path,
            config,
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        })
    }

    /// The builtin registry narrowed to the configured allowlist.
    ///
    /// Allowlist entries that name no builtin are reported and ignored.
    pub fn registry(&self) -> StaticRegistry {
        let mut registry = builtins::registry();
        if let Some(allowed) = &self.config.registry.functions {
            for name in registry.retain_functions(allowed) {
                warn!(function = %name, "allowlisted function is not a builtin");
            }
        }
        if let Some(allowed) = &self.config.registry.constructors {
            for name in registry.retain_constructors(allowed) {
                warn!(constructor = %name, "allowlisted constructor is not a builtin");
            }
        }
        registry
    }

    /// Calculated fields in configuration order.
    pub fn calculated_fields(&self) -> Vec<CalculatedField> {
        self.config
            .fields
            .iter()
            .map(|f| CalculatedField::new(&f.name, f.formula.as_deref()))
            .collect()
    }

    /// Display label of a calculated field, falling back to its name.
    pub fn label<'a>(&'a self, field: &'a str) -> &'a str {
        self.config
            .field(field)
            .map(|f| f.display_name())
            .unwrap_or(field)
    }

    pub fn renderer(&self) -> PlainRenderer {
        PlainRenderer::new(self.config.display.precision)
    }
}
