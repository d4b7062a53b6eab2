//! Config validation: checks with user-friendly error messages.

use crate::schema::HeraldConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &HeraldConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_prefix(config, &mut report);
    validate_pagination(config, &mut report);
    validate_commands(config, &mut report);
    if config.prefixes.autosave_secs == 0 {
        report.error("prefixes.autosaveSecs", "Autosave interval must be positive");
    }
    report
}

fn validate_prefix(config: &HeraldConfig, report: &mut ValidationReport) {
    let prefix = &config.default_prefix;
    if prefix.is_empty() {
        report.error("defaultPrefix", "Prefix cannot be empty");
    } else if prefix.chars().any(char::is_whitespace) {
        report.error("defaultPrefix", "Prefix cannot contain whitespace");
    }
    if config.notice_delete_secs == 0 {
        report.warn("noticeDeleteSecs", "Notices will be deleted immediately");
    }
}

fn validate_pagination(config: &HeraldConfig, report: &mut ValidationReport) {
    let pagination = &config.pagination;
    if pagination.page_size == 0 {
        report.error("pagination.pageSize", "Page size must be at least 1");
    }
    if pagination.navigation_session_secs < pagination.navigation_timeout_secs {
        report.warn(
            "pagination.navigationSessionSecs",
            "Session cap is shorter than a single navigation step",
        );
    }
}

fn validate_commands(config: &HeraldConfig, report: &mut ValidationReport) {
    for (name, meta) in &config.commands {
        let path = format!("commands.{name}");
        if name.trim().is_empty() {
            report.error("commands", "Command name cannot be empty");
        }
        for alias in &meta.aliases {
            if alias.trim().is_empty() || alias.chars().any(char::is_whitespace) {
                report.error(format!("{path}.aliases"), format!("Invalid alias '{alias}'"));
            }
        }
        if meta.description.is_none() || meta.usage.is_none() {
            report.warn(&path, "Commands without usage and description are hidden from help");
        }
    }
}
