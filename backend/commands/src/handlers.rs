//! Built-in commands.
//!
//! `help` lists what the caller may run, paged and navigable by reaction.
//! `prefix` shows or changes the guild prefix.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{Permission, PermissionSet};
use tracing::info;

use crate::arguments::{Arguments, FailReason};
use crate::context::CommandContext;
use crate::dispatch::Command;
use crate::pagination::{HelpPages, Paginator};
use crate::resolvers::IntegerArg;
use crate::types::CommandEntryBuilder;

/// Builders and capabilities for every built-in command, in registration
/// order. Metadata from configuration is applied on top at registration.
pub fn builtin_commands() -> Vec<(CommandEntryBuilder, Arc<dyn Command>)> {
    vec![
        (
            CommandEntryBuilder::new("help")
                .alias("commands")
                .usage("help [page]")
                .description("List the commands you can use."),
            Arc::new(HelpCommand),
        ),
        (
            CommandEntryBuilder::new("prefix")
                .guild_only(true)
                .permissions(PermissionSet::from([Permission::ManageGuild]))
                .usage("prefix [new prefix | reset]")
                .description("Show or change the command prefix for this server."),
            Arc::new(PrefixCommand),
        ),
    ]
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    async fn invoke(&self, ctx: CommandContext, mut args: Arguments) -> Result<()> {
        let requested = args.next(&ctx, IntegerArg).then_or_else(
            |page| Some(usize::try_from(page).unwrap_or(0)),
            |failure| {
                if failure.reason == FailReason::NotTyped {
                    Some(1)
                } else {
                    (ctx.services.on_argument_failure)(&ctx, &failure);
                    None
                }
            },
        );
        let Some(page) = requested else { return Ok(()) };

        let services = &ctx.services;
        let pages = HelpPages::build(
            services.registry.entries(),
            ctx.actor.id,
            ctx.guild_id(),
            &services.evaluator,
            services.settings.page_size,
            ctx.prefix(),
        );

        if pages.is_empty() {
            ctx.reply("No commands available.").await?;
            return Ok(());
        }
        if let Err(e) = pages.render_page(page) {
            ctx.reply_transient(format!("{e}."));
            return Ok(());
        }

        Paginator::new(Arc::clone(services), pages, ctx.actor.id)
            .start(ctx.channel.id, page)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// prefix
// ---------------------------------------------------------------------------

pub struct PrefixCommand;

#[async_trait]
impl Command for PrefixCommand {
    async fn invoke(&self, ctx: CommandContext, mut args: Arguments) -> Result<()> {
        let Some(guild) = ctx.guild_id() else {
            anyhow::bail!("prefix invoked outside a guild");
        };
        let prefixes = &ctx.services.prefixes;

        match args.rest() {
            None => {
                ctx.reply(format!("The prefix here is `{}`.", prefixes.prefix_for(Some(guild))))
                    .await?;
            }
            Some(arg) if arg.eq_ignore_ascii_case("reset") => {
                prefixes.reset(guild);
                info!(guild = %guild, actor = %ctx.actor.id, "Guild prefix reset");
                ctx.reply(format!("Prefix reset to `{}`.", prefixes.default_prefix())).await?;
            }
            Some(arg) if arg.contains(char::is_whitespace) => {
                ctx.reply_transient("A prefix cannot contain spaces.");
            }
            Some(arg) => {
                prefixes.set(guild, arg.clone());
                info!(guild = %guild, actor = %ctx.actor.id, prefix = %arg, "Guild prefix changed");
                ctx.reply(format!("Prefix set to `{arg}`.")).await?;
            }
        }
        Ok(())
    }
}
