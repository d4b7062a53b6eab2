//! In-memory collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use herald_core::{
    Actor, ChannelId, ChannelRef, EntityLookup, GuildId, GuildRef, InboundEvent, MessageEvent,
    MessageHandle, MessageId, MessageSink, ReactionEvent, RoleId, RoleRef, UserId,
};

use crate::arguments::ResolveFailure;
use crate::context::{default_failure_handler, CommandContext, DispatchSettings, Services};
use crate::dispatch::command_fn;
use crate::pagination::PageStates;
use crate::permissions::tests::FakePermissions;
use crate::permissions::PermissionEvaluator;
use crate::prefixes::PrefixMap;
use crate::registry::AliasRegistry;
use crate::types::CommandEntry;
use crate::waiter::InteractionWaiter;

pub(crate) const HOST: u64 = 1;
pub(crate) const VIEWER: u64 = 100;
pub(crate) const GUILD: u64 = 10;
pub(crate) const CHANNEL: u64 = 20;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkCall {
    Send(ChannelId, String),
    Edit(MessageId, String),
    Delete(MessageId),
    React(MessageId, String),
    Unreact(MessageId, String, UserId),
}

/// Records every call. Sent messages get ids from 1000 upward.
pub(crate) struct FakeSink {
    calls: Mutex<Vec<SinkCall>>,
    next_id: AtomicU64,
}

impl Default for FakeSink {
    fn default() -> Self {
        Self { calls: Mutex::new(Vec::new()), next_id: AtomicU64::new(1000) }
    }
}

impl FakeSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Send(_, content) => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn last_edit(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            SinkCall::Edit(_, content) => Some(content),
            _ => None,
        })
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessageSink for FakeSink {
    async fn send(&self, channel: ChannelId, content: &str) -> Result<MessageHandle> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.record(SinkCall::Send(channel, content.to_string()));
        Ok(MessageHandle { channel, message: id })
    }

    async fn edit(&self, handle: MessageHandle, content: &str) -> Result<()> {
        self.record(SinkCall::Edit(handle.message, content.to_string()));
        Ok(())
    }

    async fn delete(&self, handle: MessageHandle) -> Result<()> {
        self.record(SinkCall::Delete(handle.message));
        Ok(())
    }

    async fn add_reaction(&self, handle: MessageHandle, emoji: &str) -> Result<()> {
        self.record(SinkCall::React(handle.message, emoji.to_string()));
        Ok(())
    }

    async fn remove_reaction(&self, handle: MessageHandle, emoji: &str, user: UserId) -> Result<()> {
        self.record(SinkCall::Unreact(handle.message, emoji.to_string(), user));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Users 1 (host) and 100 (alice), role 300 in guild 10, channel 20.
pub(crate) struct FakeEntities {
    users: HashMap<UserId, Actor>,
}

impl Default for FakeEntities {
    fn default() -> Self {
        let users = [Actor::bot(HOST, "herald"), Actor::new(VIEWER, "alice")]
            .into_iter()
            .map(|actor| (actor.id, actor))
            .collect();
        Self { users }
    }
}

impl EntityLookup for FakeEntities {
    fn user(&self, id: UserId) -> Option<Actor> {
        self.users.get(&id).cloned()
    }

    fn role(&self, guild: GuildId, id: RoleId) -> Option<RoleRef> {
        (guild == GuildId(GUILD) && id == RoleId(300))
            .then(|| RoleRef { id, name: "mods".into(), guild })
    }

    fn channel(&self, id: ChannelId) -> Option<ChannelRef> {
        (id == ChannelId(CHANNEL)).then(general)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub(crate) struct TestHarness {
    pub services: Arc<Services>,
    pub sink: Arc<FakeSink>,
    /// Calls that reached the default argument-failure handler.
    pub default_failures: Arc<AtomicUsize>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with(FakePermissions::default(), DispatchSettings::default(), AliasRegistry::new())
    }

    pub fn with(perms: FakePermissions, settings: DispatchSettings, registry: AliasRegistry) -> Self {
        let sink = Arc::new(FakeSink::default());
        let default_failures = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&default_failures);
        let fallback = default_failure_handler();
        let services = Arc::new(Services {
            host: Actor::bot(HOST, "herald"),
            sink: sink.clone(),
            entities: Arc::new(FakeEntities::default()),
            evaluator: PermissionEvaluator::new(Arc::new(perms), UserId(HOST)),
            registry,
            prefixes: Arc::new(PrefixMap::new("!")),
            waiter: InteractionWaiter::new(),
            page_states: Arc::new(PageStates::default()),
            settings,
            on_argument_failure: Arc::new(move |ctx: &CommandContext, failure: &ResolveFailure| {
                counter.fetch_add(1, Ordering::SeqCst);
                fallback(ctx, failure);
            }),
        });

        Self { services, sink, default_failures }
    }

    pub fn waiter(&self) -> &Arc<InteractionWaiter> {
        &self.services.waiter
    }
}

fn general() -> ChannelRef {
    ChannelRef::new(CHANNEL, "general", Some(GuildId(GUILD)))
}

fn guild() -> GuildRef {
    GuildRef::new(GUILD, "Test Guild")
}

/// Alice invoking a documented `test` command in #general.
pub(crate) fn context(harness: &TestHarness) -> CommandContext {
    let entry = CommandEntry::builder("test")
        .usage("test <value>")
        .description("Test command")
        .build(command_fn(|_ctx, _args| async { Ok(()) }));
    CommandContext {
        actor: Actor::new(VIEWER, "alice"),
        channel: general(),
        guild: Some(guild()),
        message: Some(MessageId(900)),
        alias: "test".into(),
        entry: Arc::new(entry),
        services: harness.services.clone(),
    }
}

/// A message from `author` in #general, or in a DM when `in_guild` is false.
pub(crate) fn message_event(author: u64, content: &str, in_guild: bool) -> MessageEvent {
    let (channel, guild) = if in_guild {
        (general(), Some(guild()))
    } else {
        (ChannelRef::new(50 + author, "dm", None), None)
    };
    MessageEvent {
        id: MessageId(900),
        author: Actor::new(author, format!("user{author}")),
        channel,
        guild,
        content: content.to_string(),
        timestamp: Utc::now(),
    }
}

pub(crate) fn reaction(message: MessageId, actor: u64, emoji: &str) -> InboundEvent {
    InboundEvent::ReactionAdded(ReactionEvent {
        message,
        channel: general(),
        guild: Some(guild()),
        actor: Actor::new(actor, format!("user{actor}")),
        emoji: emoji.to_string(),
    })
}
