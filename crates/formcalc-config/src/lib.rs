//! Configuration management for formcalc.
//!
//! This crate loads `.formcalc/config.yaml` (calculated field definitions,
//! the callable allowlist, display and logging settings), layers
//! `FORMCALC_*` environment overrides on top, and discovers the `.formcalc/`
//! directory in the filesystem.

pub mod config;
pub mod config_dir;
