//! `herald-config` — Herald runtime configuration management.
//!
//! Provides:
//! - Typed config schema (prefixes, gating, pagination, logging, command metadata)
//! - YAML read/write with atomic replacement and `${VAR}` substitution
//! - Validation with path-addressed errors and warnings
//! - JSON-file persistence for per-guild prefixes

pub mod env;
pub mod io;
pub mod prefix_store;
pub mod schema;
pub mod validation;

pub use env::{collect_referenced_vars, resolve_env_vars, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, resolve_relative, write_config};
pub use prefix_store::JsonPrefixStore;
pub use schema::{HeraldConfig, LoggingConfig, PaginationConfig, PrefixConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use herald_core::HeraldError;
use std::path::Path;

/// Load and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings
/// are logged; any validation error aborts the load.
pub async fn load_and_prepare(path: &Path) -> Result<HeraldConfig> {
    let config = load_config(path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        return Err(HeraldError::ConfigError(format!(
            "{} ({} error(s) total)",
            first,
            report.errors.len()
        ))
        .into());
    }

    Ok(config)
}
