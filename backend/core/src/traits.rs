use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::types::{
    Actor, ChannelId, ChannelRef, GuildId, MessageHandle, PermissionSet, RoleId, RoleRef, UserId,
};

/// Outbound side of the host platform.
///
/// Implementations are expected to queue work on the platform's own client;
/// callers in the dispatch path spawn these futures rather than await them.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `content` to `channel`, returning a handle to the new message.
    async fn send(&self, channel: ChannelId, content: &str) -> Result<MessageHandle>;

    /// Replace the content of a previously sent message.
    async fn edit(&self, handle: MessageHandle, content: &str) -> Result<()>;

    async fn delete(&self, handle: MessageHandle) -> Result<()>;

    async fn add_reaction(&self, handle: MessageHandle, emoji: &str) -> Result<()>;

    /// Remove `user`'s `emoji` reaction from a message.
    async fn remove_reaction(&self, handle: MessageHandle, emoji: &str, user: UserId) -> Result<()>;
}

/// Delete `handle` after `delay` on a detached task.
pub fn schedule_delete(
    sink: Arc<dyn MessageSink>,
    handle: MessageHandle,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match sink.delete(handle).await {
            Ok(()) => debug!(message = %handle.message, "Scheduled delete completed"),
            Err(e) => warn!(message = %handle.message, error = %e, "Scheduled delete failed"),
        }
    })
}

/// Permission lookups answered from the host's member cache.
pub trait PermissionProvider: Send + Sync {
    /// Whether `actor` holds every flag of `required` inside `guild`.
    fn actor_has_permissions(&self, actor: UserId, guild: GuildId, required: &PermissionSet)
        -> bool;

    /// Guilds `actor` is known to be a member of.
    fn shared_guilds_of(&self, actor: UserId) -> Vec<GuildId>;

    fn is_member(&self, user: UserId, guild: GuildId) -> bool;
}

/// Resolves raw ids parsed from argument tokens into entities.
pub trait EntityLookup: Send + Sync {
    fn user(&self, id: UserId) -> Option<Actor>;

    fn role(&self, guild: GuildId, id: RoleId) -> Option<RoleRef>;

    fn channel(&self, id: ChannelId) -> Option<ChannelRef>;
}

/// Durable storage for the per-guild prefix table.
pub trait PersistenceStore: Send + Sync {
    fn load(&self) -> Result<HashMap<GuildId, String>>;

    fn save(&self, prefixes: &HashMap<GuildId, String>) -> Result<()>;
}

/// Per-command metadata supplied at registration time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSet>,
}

/// Supplies `CommandMetadata` by canonical command name.
pub trait MetadataSource: Send + Sync {
    fn metadata(&self, name: &str) -> Option<CommandMetadata>;
}

impl MetadataSource for HashMap<String, CommandMetadata> {
    fn metadata(&self, name: &str) -> Option<CommandMetadata> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, meta)| meta)
            })
            .cloned()
    }
}
