//! Command entry and dispatch result types.
use std::fmt;
use std::sync::Arc;

use herald_core::{ChannelId, CommandMetadata, PermissionSet};
use thiserror::Error;

use crate::dispatch::Command;

// ---------------------------------------------------------------------------
// Command entry
// ---------------------------------------------------------------------------

/// An immutable registry record: names, gating, help text, and the
/// capability that runs the command.
pub struct CommandEntry {
    /// Ordered, de-duplicated; the first element is the canonical name.
    aliases: Vec<String>,
    permissions: Option<PermissionSet>,
    guild_only: bool,
    usage: Option<String>,
    description: Option<String>,
    command: Arc<dyn Command>,
}

impl CommandEntry {
    pub fn builder(name: impl Into<String>) -> CommandEntryBuilder {
        CommandEntryBuilder::new(name)
    }

    /// Canonical name (first alias).
    pub fn name(&self) -> &str {
        &self.aliases[0]
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref()
    }

    pub fn guild_only(&self) -> bool {
        self.guild_only
    }

    pub fn usage(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Listed in help only when both usage and description are present.
    pub fn is_documented(&self) -> bool {
        self.usage.is_some() && self.description.is_some()
    }

    pub fn command(&self) -> Arc<dyn Command> {
        Arc::clone(&self.command)
    }

    /// Registry identity: canonical name, case-insensitive.
    pub fn same_identity(&self, other: &CommandEntry) -> bool {
        self.name().eq_ignore_ascii_case(other.name())
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("aliases", &self.aliases)
            .field("permissions", &self.permissions)
            .field("guild_only", &self.guild_only)
            .field("usage", &self.usage)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Explicit replacement for annotation-derived command metadata.
#[derive(Debug, Clone)]
pub struct CommandEntryBuilder {
    aliases: Vec<String>,
    permissions: Option<PermissionSet>,
    guild_only: bool,
    usage: Option<String>,
    description: Option<String>,
}

impl CommandEntryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            aliases: vec![name.into()],
            permissions: None,
            guild_only: false,
            usage: None,
            description: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.aliases[0]
    }

    /// Add an alias; duplicates (case-insensitive) are ignored.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn aliases<I, S>(self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        aliases.into_iter().fold(self, |builder, alias| builder.alias(alias))
    }

    pub fn permissions(mut self, permissions: impl Into<PermissionSet>) -> Self {
        self.permissions = Some(permissions.into());
        self
    }

    pub fn guild_only(mut self, guild_only: bool) -> Self {
        self.guild_only = guild_only;
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overlay externally supplied metadata. Present fields win; the
    /// canonical name never changes.
    pub fn with_metadata(mut self, meta: CommandMetadata) -> Self {
        self = self.aliases(meta.aliases);
        if let Some(usage) = meta.usage {
            self.usage = Some(usage);
        }
        if let Some(description) = meta.description {
            self.description = Some(description);
        }
        if let Some(guild_only) = meta.guild_only {
            self.guild_only = guild_only;
        }
        if let Some(permissions) = meta.permissions {
            self.permissions = Some(permissions);
        }
        self
    }

    pub fn build(self, command: Arc<dyn Command>) -> CommandEntry {
        CommandEntry {
            aliases: self.aliases,
            permissions: self.permissions,
            guild_only: self.guild_only,
            usage: self.usage,
            description: self.description,
            command,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch results
// ---------------------------------------------------------------------------

/// Why a dispatch was turned away before reaching the command body.
///
/// The `Display` text of the gating variants is the user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no command named `{0}`")]
    CommandNotFound(String),

    #[error("You don't have permission to use `{command}`.")]
    PermissionDenied { command: String },

    #[error("Commands can only be used in <#{required}>.")]
    ChannelRestricted { command: String, required: ChannelId },
}

/// Which path a single dispatch took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message carried no prefix or mention trigger.
    NotTriggered,
    Rejected(DispatchError),
    Invoked { command: String },
    /// The command body returned an error or panicked.
    Failed { command: String, error: String },
}

impl DispatchOutcome {
    pub fn is_invoked(&self) -> bool {
        matches!(self, DispatchOutcome::Invoked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::command_fn;
    use herald_core::Permission;

    fn noop() -> Arc<dyn Command> {
        command_fn(|_ctx, _args| async { Ok(()) })
    }

    #[test]
    fn canonical_name_is_first_alias() {
        let entry = CommandEntry::builder("ban").aliases(["hammer", "BAN", "b"]).build(noop());
        assert_eq!(entry.name(), "ban");
        assert_eq!(entry.aliases(), &["ban", "hammer", "b"]);
    }

    #[test]
    fn metadata_overlays_builder() {
        let meta = CommandMetadata {
            aliases: vec!["h".into()],
            usage: Some("help [page]".into()),
            description: Some("List commands".into()),
            guild_only: Some(true),
            permissions: Some(PermissionSet::from([Permission::SendMessages])),
        };
        let entry = CommandEntry::builder("help")
            .description("old")
            .with_metadata(meta)
            .build(noop());
        assert_eq!(entry.aliases(), &["help", "h"]);
        assert_eq!(entry.description(), Some("List commands"));
        assert!(entry.guild_only());
        assert!(entry.is_documented());
        assert!(entry.permissions().unwrap().contains(Permission::SendMessages));
    }

    #[test]
    fn gating_errors_render_notice_text() {
        let err = DispatchError::ChannelRestricted { command: "ping".into(), required: ChannelId(9) };
        assert_eq!(err.to_string(), "Commands can only be used in <#9>.");
    }
}
