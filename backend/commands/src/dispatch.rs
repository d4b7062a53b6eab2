//! Command dispatch: trigger detection, lookup, gating, invocation.
//!
//! Gating runs synchronously on the event path and either rejects the
//! message or yields an [`Invocation`]. Running an invocation spawns the
//! command body on its own task, so an error or panic in one command is
//! logged and turned into [`DispatchOutcome::Failed`] instead of reaching
//! the event loop.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{Actor, ChannelRef, GuildId, GuildRef, MessageEvent, MessageHandle, MessageId};
use herald_logging::{DispatchAudit, DispatchAuditEvent};
use tracing::{debug, error, trace};

use crate::arguments::Arguments;
use crate::context::{CommandContext, Services};
use crate::detection::detect_trigger;
use crate::types::{DispatchError, DispatchOutcome};

// ---------------------------------------------------------------------------
// Command capability
// ---------------------------------------------------------------------------

/// The single capability every command exposes.
#[async_trait]
pub trait Command: Send + Sync {
    async fn invoke(&self, ctx: CommandContext, args: Arguments) -> Result<()>;
}

/// A command that takes its tokens verbatim and skips argument resolution.
#[async_trait]
pub trait RawCommand: Send + Sync {
    async fn run(&self, ctx: CommandContext, tokens: Vec<String>) -> Result<()>;
}

/// Adapts a [`RawCommand`] to [`Command`].
pub struct Raw<C>(pub C);

#[async_trait]
impl<C: RawCommand> Command for Raw<C> {
    async fn invoke(&self, ctx: CommandContext, args: Arguments) -> Result<()> {
        self.0.run(ctx, args.into_tokens()).await
    }
}

struct FnCommand<F>(F);

#[async_trait]
impl<F, Fut> Command for FnCommand<F>
where
    F: Fn(CommandContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn invoke(&self, ctx: CommandContext, args: Arguments) -> Result<()> {
        (self.0)(ctx, args).await
    }
}

/// Wrap an async closure as a command.
pub fn command_fn<F, Fut>(f: F) -> Arc<dyn Command>
where
    F: Fn(CommandContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnCommand(f))
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dispatcher {
    services: Arc<Services>,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Detect a trigger in `event` and gate it. Never awaits.
    pub fn prepare(&self, event: &MessageEvent) -> Result<Invocation, DispatchOutcome> {
        if event.author.bot {
            return Err(DispatchOutcome::NotTriggered);
        }

        let services = &self.services;
        let prefix = services.prefixes.prefix_for(event.guild.as_ref().map(|g| g.id));
        let trigger = detect_trigger(
            &event.content,
            &prefix,
            services.host.id,
            services.settings.mention_trigger,
        )
        .ok_or(DispatchOutcome::NotTriggered)?;

        self.gate(
            event.author.clone(),
            event.channel.clone(),
            event.guild.clone(),
            Some(event.id),
            trigger.alias,
            trigger.tokens,
        )
    }

    /// Dispatch an inbound message and wait for the command to finish.
    pub async fn on_message(&self, event: &MessageEvent) -> DispatchOutcome {
        match self.prepare(event) {
            Ok(invocation) => invocation.run().await,
            Err(outcome) => outcome,
        }
    }

    /// Dispatch without an inbound message, e.g. from scripts or tests.
    /// Lookup, gating and invocation are the same as for messages.
    pub async fn dispatch_direct(
        &self,
        actor: Actor,
        channel: ChannelRef,
        guild: Option<GuildRef>,
        alias: impl Into<String>,
        tokens: Vec<String>,
    ) -> DispatchOutcome {
        match self.gate(actor, channel, guild, None, alias.into(), tokens) {
            Ok(invocation) => invocation.run().await,
            Err(outcome) => outcome,
        }
    }

    fn gate(
        &self,
        actor: Actor,
        channel: ChannelRef,
        guild: Option<GuildRef>,
        message: Option<MessageId>,
        alias: String,
        tokens: Vec<String>,
    ) -> Result<Invocation, DispatchOutcome> {
        let services = &self.services;

        let Some(entry) = services.registry.lookup(&alias) else {
            trace!(alias = %alias, actor = %actor.id, "No command for alias");
            return Err(DispatchOutcome::Rejected(DispatchError::CommandNotFound(alias)));
        };

        let guild_id = guild.as_ref().map(|g| g.id);
        let trigger = message.map(|message| MessageHandle { channel: channel.id, message });
        let reject = |err: DispatchError, audit: DispatchAuditEvent| -> Result<Invocation, DispatchOutcome> {
            DispatchAudit::record(actor.id.get(), channel.id.get(), guild_id.map(GuildId::get), audit);
            services.notify_transient(channel.id, trigger, err.to_string());
            Err(DispatchOutcome::Rejected(err))
        };

        if !services.evaluator.can_invoke(actor.id, guild_id, &entry) {
            debug!(command = %entry.name(), actor = %actor.id, "Permission denied");
            let command = entry.name().to_string();
            return reject(
                DispatchError::PermissionDenied { command: command.clone() },
                DispatchAuditEvent::PermissionDenied { command },
            );
        }

        if let Some(required) = services.settings.restricted_channel {
            if channel.id != required && !services.evaluator.has_admin_override(actor.id, guild_id) {
                debug!(command = %entry.name(), channel = %channel.id, "Outside restricted channel");
                let command = entry.name().to_string();
                return reject(
                    DispatchError::ChannelRestricted { command: command.clone(), required },
                    DispatchAuditEvent::ChannelRestricted { command, required_channel: required.get() },
                );
            }
        }

        let ctx = CommandContext {
            actor,
            channel,
            guild,
            message,
            alias,
            entry,
            services: Arc::clone(services),
        };
        Ok(Invocation { ctx, args: Arguments::new(tokens) })
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A gated command call, ready to run.
pub struct Invocation {
    ctx: CommandContext,
    args: Arguments,
}

impl Invocation {
    pub fn command(&self) -> &str {
        self.ctx.entry.name()
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Run the command body on its own task and report how it ended.
    pub async fn run(self) -> DispatchOutcome {
        let Invocation { ctx, args } = self;
        let name = ctx.entry.name().to_string();
        let actor_id = ctx.actor.id.get();
        let channel_id = ctx.channel.id.get();
        let guild_id = ctx.guild_id().map(GuildId::get);

        DispatchAudit::record(
            actor_id,
            channel_id,
            guild_id,
            DispatchAuditEvent::Invoked {
                command: name.clone(),
                alias: ctx.alias.clone(),
                arguments: args.remaining().join(" "),
            },
        );

        let command = ctx.entry.command();
        let task = tokio::spawn(async move { command.invoke(ctx, args).await });

        let error = match task.await {
            Ok(Ok(())) => {
                debug!(command = %name, "Command completed");
                return DispatchOutcome::Invoked { command: name };
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(e) if e.is_panic() => format!("panicked: {}", panic_message(e.into_panic())),
            Err(e) => e.to_string(),
        };

        error!(command = %name, error = %error, "Command failed");
        DispatchAudit::record(
            actor_id,
            channel_id,
            guild_id,
            DispatchAuditEvent::Failed { command: name.clone(), error_msg: error.clone() },
        );
        DispatchOutcome::Failed { command: name, error }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
