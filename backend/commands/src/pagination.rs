//! Paged command listings with reaction navigation.
//!
//! [`HelpPages`] is the pure part: filter, group, render. [`Paginator`]
//! drives one navigation session: it sends the first page, then chains
//! waits on the interaction waiter, re-arming after every navigation until
//! a step times out or the session cap is reached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use herald_core::{
    ChannelId, EventTag, GuildId, InboundEvent, MessageHandle, MessageId, ReactionEvent, UserId,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::Services;
use crate::permissions::PermissionEvaluator;
use crate::types::CommandEntry;

pub const PREVIOUS_PAGE: &str = "◀";
pub const NEXT_PAGE: &str = "▶";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page {requested} does not exist (1-{page_count})")]
    OutOfRange { requested: usize, page_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub number: usize,
    pub page_count: usize,
    pub content: String,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HelpLine {
    name: String,
    usage: String,
    description: String,
}

/// The commands one viewer may run, grouped into fixed-size pages.
#[derive(Debug, Clone)]
pub struct HelpPages {
    lines: Vec<HelpLine>,
    page_size: usize,
    prefix: String,
}

impl HelpPages {
    /// Keep entries `viewer` may invoke from `guild` that have both usage
    /// and description.
    pub fn build<'a>(
        entries: impl IntoIterator<Item = &'a Arc<CommandEntry>>,
        viewer: UserId,
        guild: Option<GuildId>,
        evaluator: &PermissionEvaluator,
        page_size: usize,
        prefix: impl Into<String>,
    ) -> Self {
        let lines = entries
            .into_iter()
            .filter(|entry| evaluator.can_invoke(viewer, guild, entry))
            .filter_map(|entry| {
                Some(HelpLine {
                    name: entry.name().to_string(),
                    usage: entry.usage()?.to_string(),
                    description: entry.description()?.to_string(),
                })
            })
            .collect();
        Self { lines, page_size: page_size.max(1), prefix: prefix.into() }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.lines.len().div_ceil(self.page_size)
    }

    /// Number of entries on page `n` (1-based), or 0 when out of range.
    pub fn page_len(&self, n: usize) -> usize {
        self.lines.chunks(self.page_size).nth(n.wrapping_sub(1)).map_or(0, <[HelpLine]>::len)
    }

    pub fn render_page(&self, n: usize) -> Result<RenderedPage, PageError> {
        let page_count = self.page_count();
        if n == 0 || n > page_count {
            return Err(PageError::OutOfRange { requested: n, page_count });
        }

        let start = (n - 1) * self.page_size;
        let end = (start + self.page_size).min(self.lines.len());
        let mut content = format!("**Commands** (page {n}/{page_count})");
        for line in &self.lines[start..end] {
            content.push_str(&format!(
                "\n`{prefix}{name}`: {description}\n    usage: `{prefix}{usage}`",
                prefix = self.prefix,
                name = line.name,
                description = line.description,
                usage = line.usage,
            ));
        }

        Ok(RenderedPage {
            number: n,
            page_count,
            content,
            has_previous: n > 1,
            has_next: n < page_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Page state
// ---------------------------------------------------------------------------

/// Current page per (message, viewer). Entries are evicted when their
/// session ends.
#[derive(Debug, Default)]
pub struct PageStates {
    pages: Mutex<HashMap<(MessageId, UserId), usize>>,
}

impl PageStates {
    pub fn get(&self, message: MessageId, viewer: UserId) -> Option<usize> {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).get(&(message, viewer)).copied()
    }

    pub fn set(&self, message: MessageId, viewer: UserId, page: usize) {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).insert((message, viewer), page);
    }

    pub fn evict(&self, message: MessageId, viewer: UserId) {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).remove(&(message, viewer));
    }

    pub fn len(&self) -> usize {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Navigation session
// ---------------------------------------------------------------------------

/// One viewer's navigation session over a rendered listing.
///
/// Navigation state advances and the next wait is armed inside the match
/// callback, so no reaction can slip between two waits. Sink traffic (the
/// edit and reaction cleanup) runs on spawned tasks and converges on the
/// latest page.
pub struct Paginator {
    services: Arc<Services>,
    pages: HelpPages,
    viewer: UserId,
    step_timeout: Duration,
    session_deadline: Instant,
    /// Page the viewer has navigated to.
    current: AtomicUsize,
    /// Page the listing message currently shows.
    shown: tokio::sync::Mutex<usize>,
}

impl Paginator {
    pub fn new(services: Arc<Services>, pages: HelpPages, viewer: UserId) -> Arc<Self> {
        let step_timeout = services.settings.navigation_timeout;
        let session_deadline = Instant::now() + services.settings.navigation_session;
        Arc::new(Self {
            services,
            pages,
            viewer,
            step_timeout,
            session_deadline,
            current: AtomicUsize::new(0),
            shown: tokio::sync::Mutex::new(0),
        })
    }

    /// Send page `first` to `channel` and start listening for navigation.
    pub async fn start(self: Arc<Self>, channel: ChannelId, first: usize) -> Result<MessageHandle> {
        let page = self.pages.render_page(first)?;
        let sink = &self.services.sink;
        let handle = sink.send(channel, &page.content).await?;
        self.current.store(page.number, Ordering::SeqCst);
        *self.shown.lock().await = page.number;

        if page.page_count > 1 {
            for emoji in [PREVIOUS_PAGE, NEXT_PAGE] {
                if let Err(e) = sink.add_reaction(handle, emoji).await {
                    warn!(message = %handle.message, error = %e, "Failed to add navigation reaction");
                }
            }
            self.services.page_states.set(handle.message, self.viewer, page.number);
            Arc::clone(&self).arm(handle);
        }

        info!(
            message = %handle.message,
            viewer = %self.viewer,
            page = page.number,
            pages = page.page_count,
            "Started paginated listing"
        );
        Ok(handle)
    }

    /// Page the viewer is on.
    pub fn current_page(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn correlation(&self, handle: MessageHandle) -> String {
        format!("{}:{}", handle.message, self.viewer)
    }

    /// Register the next navigation wait, bounded by the session cap.
    fn arm(self: Arc<Self>, handle: MessageHandle) {
        let remaining = self.session_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tokio::spawn(async move { self.finish(handle).await });
            return;
        }

        let timeout = self.step_timeout.min(remaining);
        let host = self.services.host.id;
        let message = handle.message;
        let on_match = Arc::clone(&self);
        let on_timeout = Arc::clone(&self);

        self.services.waiter.register_correlated(
            Some(self.correlation(handle)),
            EventTag::Reaction,
            move |event: &InboundEvent| {
                event.as_reaction().is_some_and(|r| {
                    r.message == message
                        && r.actor.id != host
                        && (r.emoji == PREVIOUS_PAGE || r.emoji == NEXT_PAGE)
                })
            },
            move |event| {
                if let InboundEvent::ReactionAdded(reaction) = event {
                    on_match.navigate(handle, reaction);
                }
            },
            move || {
                tokio::spawn(async move { on_timeout.finish(handle).await });
            },
            timeout,
        );
    }

    fn navigate(self: Arc<Self>, handle: MessageHandle, reaction: ReactionEvent) {
        if reaction.actor.id != self.viewer {
            debug!(
                message = %handle.message,
                actor = %reaction.actor.id,
                "Rejecting navigation from non-owner"
            );
            Arc::clone(&self).arm(handle);
            tokio::spawn(async move {
                let sink = &self.services.sink;
                if let Err(e) = sink.remove_reaction(handle, &reaction.emoji, reaction.actor.id).await {
                    warn!(message = %handle.message, error = %e, "Failed to revert reaction");
                }
            });
            return;
        }

        let page = self.current.load(Ordering::SeqCst);
        let target = if reaction.emoji == PREVIOUS_PAGE { page.saturating_sub(1) } else { page + 1 };
        let next = self.pages.render_page(target).map_or(page, |rendered| rendered.number);

        self.current.store(next, Ordering::SeqCst);
        self.services.page_states.set(handle.message, self.viewer, next);
        Arc::clone(&self).arm(handle);

        tokio::spawn(async move {
            if let Err(e) = self.services.sink.remove_reaction(handle, &reaction.emoji, self.viewer).await {
                debug!(message = %handle.message, error = %e, "Failed to clear viewer reaction");
            }
            self.sync_page(handle).await;
        });
    }

    /// Edit the listing to the current page if it shows another one.
    async fn sync_page(&self, handle: MessageHandle) {
        let mut shown = self.shown.lock().await;
        let current = self.current.load(Ordering::SeqCst);
        if current == *shown {
            return;
        }
        let Ok(rendered) = self.pages.render_page(current) else { return };
        match self.services.sink.edit(handle, &rendered.content).await {
            Ok(()) => *shown = current,
            Err(e) => warn!(message = %handle.message, error = %e, "Failed to edit page"),
        }
    }

    async fn finish(self: Arc<Self>, handle: MessageHandle) {
        self.services.page_states.evict(handle.message, self.viewer);
        let host = self.services.host.id;
        for emoji in [PREVIOUS_PAGE, NEXT_PAGE] {
            if let Err(e) = self.services.sink.remove_reaction(handle, emoji, host).await {
                debug!(message = %handle.message, error = %e, "Failed to remove navigation reaction");
            }
        }
        debug!(message = %handle.message, viewer = %self.viewer, "Pagination session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::command_fn;
    use crate::permissions::tests::FakePermissions;
    use crate::testing::{reaction, SinkCall, TestHarness, HOST, VIEWER};
    use herald_core::Permission;

    fn documented(name: &str) -> Arc<CommandEntry> {
        Arc::new(
            CommandEntry::builder(name)
                .usage(name)
                .description(format!("{name} things"))
                .build(command_fn(|_ctx, _args| async { Ok(()) })),
        )
    }

    fn pages(count: usize, size: usize) -> HelpPages {
        let entries: Vec<_> = (0..count).map(|i| documented(&format!("cmd{i}"))).collect();
        let evaluator = PermissionEvaluator::new(Arc::new(FakePermissions::default()), UserId(HOST));
        HelpPages::build(&entries, UserId(VIEWER), None, &evaluator, size, "!")
    }

    #[test]
    fn five_entries_in_pages_of_two() {
        let pages = pages(5, 2);
        assert_eq!(pages.page_count(), 3);
        assert_eq!([pages.page_len(1), pages.page_len(2), pages.page_len(3)], [2, 2, 1]);

        let first = pages.render_page(1).unwrap();
        assert!(!first.has_previous);
        assert!(first.has_next);

        let last = pages.render_page(3).unwrap();
        assert!(last.has_previous);
        assert!(!last.has_next);

        assert_eq!(
            pages.render_page(4),
            Err(PageError::OutOfRange { requested: 4, page_count: 3 })
        );
        assert!(pages.render_page(0).is_err());
    }

    #[test]
    fn filters_undocumented_and_forbidden_entries() {
        let hidden = Arc::new(CommandEntry::builder("hidden").build(command_fn(|_c, _a| async { Ok(()) })));
        let gated = Arc::new(
            CommandEntry::builder("ban")
                .usage("ban <user>")
                .description("Ban")
                .guild_only(true)
                .permissions([Permission::BanMembers])
                .build(command_fn(|_c, _a| async { Ok(()) })),
        );
        let entries = vec![documented("ping"), hidden, gated];
        let evaluator = PermissionEvaluator::new(Arc::new(FakePermissions::default()), UserId(HOST));

        let pages = HelpPages::build(&entries, UserId(VIEWER), Some(GuildId(10)), &evaluator, 5, "?");
        assert_eq!(pages.len(), 1);
        let page = pages.render_page(1).unwrap();
        assert!(page.content.contains("`?ping`"));
        assert!(!page.content.contains("ban"));
    }

    #[test]
    fn empty_listing_has_no_pages() {
        let pages = pages(0, 2);
        assert_eq!(pages.page_count(), 0);
        assert!(pages.render_page(1).is_err());
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn owner_navigates_forward_and_back() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(5, 2), UserId(VIEWER));
        let handle = paginator.start(ChannelId(20), 1).await.unwrap();

        assert_eq!(harness.waiter().pending(), 1);
        assert!(harness.sink.calls().contains(&SinkCall::React(handle.message, NEXT_PAGE.into())));

        assert!(harness.waiter().deliver(&reaction(handle.message, VIEWER, NEXT_PAGE)));
        settle().await;
        assert_eq!(harness.services.page_states.get(handle.message, UserId(VIEWER)), Some(2));
        assert!(harness.sink.last_edit().unwrap().contains("page 2/3"));
        assert_eq!(harness.waiter().pending(), 1);

        harness.waiter().deliver(&reaction(handle.message, VIEWER, PREVIOUS_PAGE));
        settle().await;
        assert_eq!(harness.services.page_states.get(handle.message, UserId(VIEWER)), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_past_the_end_stays_put() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(3, 2), UserId(VIEWER));
        let handle = paginator.start(ChannelId(20), 2).await.unwrap();

        harness.waiter().deliver(&reaction(handle.message, VIEWER, NEXT_PAGE));
        settle().await;
        assert_eq!(harness.services.page_states.get(handle.message, UserId(VIEWER)), Some(2));
        assert!(harness.sink.last_edit().is_none());
        assert_eq!(harness.waiter().pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_owner_reaction_is_reverted() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(5, 2), UserId(VIEWER));
        let handle = paginator.start(ChannelId(20), 1).await.unwrap();

        let stranger = 777;
        assert!(harness.waiter().deliver(&reaction(handle.message, stranger, NEXT_PAGE)));
        settle().await;

        assert!(harness.sink.calls().contains(&SinkCall::Unreact(
            handle.message,
            NEXT_PAGE.into(),
            UserId(stranger)
        )));
        assert_eq!(harness.services.page_states.get(handle.message, UserId(VIEWER)), Some(1));
        assert!(harness.sink.last_edit().is_none());
        assert_eq!(harness.waiter().pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reactions_in_quick_succession_are_all_handled() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(5, 2), UserId(VIEWER));
        let handle = Arc::clone(&paginator).start(ChannelId(20), 1).await.unwrap();

        // No yield between deliveries: each match must already have re-armed.
        assert!(harness.waiter().deliver(&reaction(handle.message, VIEWER, NEXT_PAGE)));
        assert!(harness.waiter().deliver(&reaction(handle.message, 777, NEXT_PAGE)));
        assert!(harness.waiter().deliver(&reaction(handle.message, VIEWER, NEXT_PAGE)));
        assert_eq!(paginator.current_page(), 3);
        assert_eq!(harness.waiter().pending(), 1);

        settle().await;
        assert!(harness.sink.calls().contains(&SinkCall::Unreact(
            handle.message,
            NEXT_PAGE.into(),
            UserId(777)
        )));
        assert_eq!(harness.services.page_states.get(handle.message, UserId(VIEWER)), Some(3));
        assert!(harness.sink.last_edit().unwrap().contains("page 3/3"));
    }

    #[tokio::test(start_paused = true)]
    async fn step_timeout_ends_session() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(5, 2), UserId(VIEWER));
        let handle = paginator.start(ChannelId(20), 1).await.unwrap();

        tokio::time::sleep(harness.services.settings.navigation_timeout + Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(harness.waiter().pending(), 0);
        assert!(harness.services.page_states.is_empty());
        assert!(harness.sink.calls().contains(&SinkCall::Unreact(
            handle.message,
            NEXT_PAGE.into(),
            UserId(HOST)
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn session_cap_bounds_chained_waits() {
        let harness = TestHarness::new();
        let session = harness.services.settings.navigation_session;
        let step = harness.services.settings.navigation_timeout;
        let paginator = Paginator::new(harness.services.clone(), pages(5, 2), UserId(VIEWER));
        let handle = paginator.start(ChannelId(20), 1).await.unwrap();

        // Keep navigating just before each step expires.
        let mut elapsed = Duration::ZERO;
        let mut forward = true;
        while elapsed + step < session {
            tokio::time::sleep(step - Duration::from_secs(1)).await;
            elapsed += step - Duration::from_secs(1);
            let emoji = if forward { NEXT_PAGE } else { PREVIOUS_PAGE };
            forward = !forward;
            assert!(harness.waiter().deliver(&reaction(handle.message, VIEWER, emoji)));
            settle().await;
        }

        tokio::time::sleep(session).await;
        settle().await;
        assert_eq!(harness.waiter().pending(), 0);
        assert!(harness.services.page_states.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_registers_no_wait() {
        let harness = TestHarness::new();
        let paginator = Paginator::new(harness.services.clone(), pages(2, 5), UserId(VIEWER));
        paginator.start(ChannelId(20), 1).await.unwrap();
        assert_eq!(harness.waiter().pending(), 0);
        assert!(harness.sink.calls().iter().all(|c| !matches!(c, SinkCall::React(..))));
    }
}
