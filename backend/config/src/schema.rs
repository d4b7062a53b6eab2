//! Herald runtime configuration schema.
//!
//! Typed for serde YAML deserialization; every field has a default so a
//! partial file (or no file) yields a working configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use herald_core::{ChannelId, CommandMetadata, MetadataSource};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a Herald deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeraldConfig {
    /// Prefix used in direct messages and guilds without an override.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,

    /// Accept `@host <command>` as a trigger.
    #[serde(default = "default_true")]
    pub mention_trigger: bool,

    /// When set, commands may only be invoked in this channel
    /// (administrators are exempt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted_channel: Option<ChannelId>,

    /// Lifetime of transient gating notices.
    #[serde(default = "default_notice_delete_secs")]
    pub notice_delete_secs: u64,

    /// Pagination settings for listings.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Prefix persistence.
    #[serde(default)]
    pub prefixes: PrefixConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-command metadata keyed by canonical command name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub commands: HashMap<String, CommandMetadata>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            default_prefix: default_prefix(),
            mention_trigger: true,
            restricted_channel: None,
            notice_delete_secs: default_notice_delete_secs(),
            pagination: PaginationConfig::default(),
            prefixes: PrefixConfig::default(),
            logging: LoggingConfig::default(),
            commands: HashMap::new(),
        }
    }
}

impl HeraldConfig {
    pub fn notice_delay(&self) -> Duration {
        Duration::from_secs(self.notice_delete_secs)
    }
}

impl MetadataSource for HeraldConfig {
    fn metadata(&self, name: &str) -> Option<CommandMetadata> {
        self.commands.metadata(name)
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// How long a single page waits for a navigation reaction.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    /// Hard cap on the whole navigation session.
    #[serde(default = "default_navigation_session_secs")]
    pub navigation_session_secs: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            navigation_session_secs: default_navigation_session_secs(),
        }
    }
}

impl PaginationConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.navigation_session_secs)
    }
}

// ---------------------------------------------------------------------------
// Prefix persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixConfig {
    /// JSON file holding guild prefix overrides. Relative paths resolve
    /// against the config directory.
    #[serde(default = "default_prefix_file")]
    pub file: PathBuf,
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self { file: default_prefix_file(), autosave_secs: default_autosave_secs() }
    }
}

impl PrefixConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_secs)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), dir: None }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_prefix() -> String {
    "!".to_string()
}

fn default_true() -> bool {
    true
}

fn default_notice_delete_secs() -> u64 {
    15
}

fn default_page_size() -> usize {
    5
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_navigation_session_secs() -> u64 {
    300
}

fn default_prefix_file() -> PathBuf {
    PathBuf::from("prefixes.json")
}

fn default_autosave_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}
