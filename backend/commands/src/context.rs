//! Execution context handed to every command invocation.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use herald_config::HeraldConfig;
use herald_core::{
    schedule_delete, Actor, ChannelId, ChannelRef, EntityLookup, GuildId, GuildRef, MessageHandle,
    MessageId, MessageSink,
};
use tracing::warn;

use crate::arguments::ResolveFailure;
use crate::pagination::PageStates;
use crate::permissions::PermissionEvaluator;
use crate::prefixes::PrefixMap;
use crate::registry::AliasRegistry;
use crate::types::CommandEntry;
use crate::waiter::InteractionWaiter;

/// Process-wide handler for argument failures no continuation claimed.
pub type FailureHandler = Arc<dyn Fn(&CommandContext, &ResolveFailure) + Send + Sync>;

/// Runtime settings derived from `HeraldConfig` once at startup.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub mention_trigger: bool,
    pub restricted_channel: Option<ChannelId>,
    pub notice_delay: Duration,
    pub page_size: usize,
    pub navigation_timeout: Duration,
    pub navigation_session: Duration,
}

impl From<&HeraldConfig> for DispatchSettings {
    fn from(config: &HeraldConfig) -> Self {
        Self {
            mention_trigger: config.mention_trigger,
            restricted_channel: config.restricted_channel,
            notice_delay: config.notice_delay(),
            page_size: config.pagination.page_size.max(1),
            navigation_timeout: config.pagination.step_timeout(),
            navigation_session: config.pagination.session_lifetime(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&HeraldConfig::default())
    }
}

/// Shared collaborators, constructed once by the framework and reachable
/// from every context.
pub struct Services {
    pub host: Actor,
    pub sink: Arc<dyn MessageSink>,
    pub entities: Arc<dyn EntityLookup>,
    pub evaluator: PermissionEvaluator,
    pub registry: AliasRegistry,
    pub prefixes: Arc<PrefixMap>,
    pub waiter: Arc<InteractionWaiter>,
    pub page_states: Arc<PageStates>,
    pub settings: DispatchSettings,
    pub on_argument_failure: FailureHandler,
}

impl Services {
    /// Send `content` and delete it (and `trigger`, if any) after the
    /// configured notice delay. Never awaited by the caller.
    pub fn notify_transient(
        &self,
        channel: ChannelId,
        trigger: Option<MessageHandle>,
        content: String,
    ) {
        let sink = Arc::clone(&self.sink);
        let delay = self.settings.notice_delay;
        tokio::spawn(async move {
            match sink.send(channel, &content).await {
                Ok(notice) => {
                    schedule_delete(Arc::clone(&sink), notice, delay);
                }
                Err(e) => warn!(channel = %channel, error = %e, "Failed to send notice"),
            }
            if let Some(trigger) = trigger {
                schedule_delete(sink, trigger, delay);
            }
        });
    }
}

/// Who invoked what, where. Cheap to clone.
#[derive(Clone)]
pub struct CommandContext {
    pub actor: Actor,
    pub channel: ChannelRef,
    pub guild: Option<GuildRef>,
    /// Triggering message; `None` for direct dispatch.
    pub message: Option<MessageId>,
    /// The alias the actor typed.
    pub alias: String,
    pub entry: Arc<CommandEntry>,
    pub services: Arc<Services>,
}

impl CommandContext {
    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild.as_ref().map(|g| g.id)
    }

    pub fn is_direct_message(&self) -> bool {
        self.guild.is_none()
    }

    /// Prefix in effect where this command was invoked.
    pub fn prefix(&self) -> String {
        self.services.prefixes.prefix_for(self.guild_id())
    }

    pub fn trigger_handle(&self) -> Option<MessageHandle> {
        self.message.map(|message| MessageHandle { channel: self.channel.id, message })
    }

    /// Reply in the invoking channel.
    pub async fn reply(&self, content: impl AsRef<str>) -> Result<MessageHandle> {
        self.services.sink.send(self.channel.id, content.as_ref()).await
    }

    /// Reply with a notice that removes itself (and the trigger) later.
    pub fn reply_transient(&self, content: impl Into<String>) {
        self.services.notify_transient(self.channel.id, self.trigger_handle(), content.into());
    }
}

/// Default argument-failure handler: a transient notice with the usage line.
pub fn default_failure_handler() -> FailureHandler {
    Arc::new(|ctx: &CommandContext, failure: &ResolveFailure| {
        let mut notice = failure.to_string();
        if let Some(usage) = ctx.entry.usage() {
            notice.push_str(&format!("\nUsage: `{}{}`", ctx.prefix(), usage));
        }
        ctx.reply_transient(notice);
    })
}
