//! Interaction waiter: predicate-based pending waits with timeout eviction.
//!
//! A command that needs a follow-up event (a reaction, a reply) registers a
//! wait and returns. Inbound events are offered to the pending waits of the
//! matching tag; the first wait whose predicate accepts the event is removed
//! and its `on_match` runs. If the wait's timer fires first, it is removed
//! and `on_timeout` runs instead.
//!
//! Removal from the table is the linearization point: whichever path
//! removes the wait runs its callback, the other path finds nothing and
//! does nothing. Callbacks always run after the table lock is released.
//!
//! Predicates and callbacks are caller code running on the delivery path.
//! A panic in one is logged and contained: a panicking predicate counts as
//! a non-match, a panicking callback still consumes its wait.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use herald_core::{EventTag, InboundEvent};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::dispatch::panic_message;

type Predicate = Box<dyn Fn(&InboundEvent) -> bool + Send + Sync>;
type OnMatch = Box<dyn FnOnce(InboundEvent) + Send>;
type OnTimeout = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitId(Uuid);

impl std::fmt::Display for WaitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct PendingWait {
    id: WaitId,
    tag: EventTag,
    correlation: Option<String>,
    deadline: Instant,
    predicate: Predicate,
    on_match: OnMatch,
    on_timeout: OnTimeout,
    timer: Option<JoinHandle<()>>,
}

impl PendingWait {
    fn accepts(&self, tag: EventTag, event: &InboundEvent) -> bool {
        self.tag == tag
            && contained(self.id, "predicate", || (self.predicate)(event)).unwrap_or(false)
    }

    fn fire_match(self, event: InboundEvent) {
        let (id, on_match) = (self.id, self.on_match);
        contained(id, "on_match", move || on_match(event));
    }

    fn fire_timeout(self) {
        let (id, on_timeout) = (self.id, self.on_timeout);
        contained(id, "on_timeout", on_timeout);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Concurrency-safe table of pending waits.
#[derive(Default)]
pub struct InteractionWaiter {
    pending: Mutex<Vec<PendingWait>>,
}

impl InteractionWaiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn table(&self) -> MutexGuard<'_, Vec<PendingWait>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a wait for the next `tag` event accepted by `predicate`.
    ///
    /// Exactly one of `on_match` or `on_timeout` eventually runs, unless the
    /// waiter is shut down first. Predicates run under the table lock and
    /// must not call back into the waiter.
    pub fn register<P, M, T>(
        self: &Arc<Self>,
        tag: EventTag,
        predicate: P,
        on_match: M,
        on_timeout: T,
        timeout: Duration,
    ) -> WaitId
    where
        P: Fn(&InboundEvent) -> bool + Send + Sync + 'static,
        M: FnOnce(InboundEvent) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        self.register_correlated(None, tag, predicate, on_match, on_timeout, timeout)
    }

    /// Like [`register`](Self::register), tagging the wait with a
    /// correlation key (e.g. `"<message>:<user>"`).
    pub fn register_correlated<P, M, T>(
        self: &Arc<Self>,
        correlation: Option<String>,
        tag: EventTag,
        predicate: P,
        on_match: M,
        on_timeout: T,
        timeout: Duration,
    ) -> WaitId
    where
        P: Fn(&InboundEvent) -> bool + Send + Sync + 'static,
        M: FnOnce(InboundEvent) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let id = WaitId(Uuid::new_v4());
        let weak: Weak<Self> = Arc::downgrade(self);

        // Hold the lock while spawning so the timer cannot look for the
        // wait before it is in the table.
        let mut table = self.table();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(waiter) = weak.upgrade() {
                waiter.expire(id);
            }
        });
        table.push(PendingWait {
            id,
            tag,
            correlation: correlation.clone(),
            deadline: Instant::now() + timeout,
            predicate: Box::new(predicate),
            on_match: Box::new(on_match),
            on_timeout: Box::new(on_timeout),
            timer: Some(timer),
        });
        debug!(wait = %id, tag = %tag, correlation = ?correlation, timeout_ms = timeout.as_millis() as u64, "Registered pending wait");
        id
    }

    /// Offer `event` to pending waits; the first match consumes it.
    /// Returns whether any wait matched.
    pub fn deliver(&self, event: &InboundEvent) -> bool {
        let tag = event.tag();
        let matched = {
            let mut table = self.table();
            let position = table.iter().position(|w| w.accepts(tag, event));
            position.map(|i| table.remove(i))
        };

        match matched {
            Some(mut wait) => {
                wait.cancel_timer();
                trace!(wait = %wait.id, "Pending wait matched");
                wait.fire_match(event.clone());
                true
            }
            None => false,
        }
    }

    /// Offer `event` to every pending wait; all matches consume it.
    /// Returns the number of waits that matched.
    pub fn deliver_all(&self, event: &InboundEvent) -> usize {
        let tag = event.tag();
        let matched: Vec<PendingWait> = {
            let mut table = self.table();
            let (hit, keep): (Vec<_>, Vec<_>) =
                table.drain(..).partition(|w| w.accepts(tag, event));
            *table = keep;
            hit
        };

        let count = matched.len();
        for mut wait in matched {
            wait.cancel_timer();
            wait.fire_match(event.clone());
        }
        count
    }

    /// Wait for the next matching event as a future. Resolves to `None` on
    /// timeout or shutdown.
    pub async fn next_event<P>(
        self: &Arc<Self>,
        tag: EventTag,
        predicate: P,
        timeout: Duration,
    ) -> Option<InboundEvent>
    where
        P: Fn(&InboundEvent) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let on_timeout_slot = Arc::clone(&slot);

        self.register(
            tag,
            predicate,
            move |event| {
                if let Some(tx) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    let _ = tx.send(Some(event));
                }
            },
            move || {
                if let Some(tx) = on_timeout_slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    let _ = tx.send(None);
                }
            },
            timeout,
        );

        rx.await.ok().flatten()
    }

    /// Number of waits still pending.
    pub fn pending(&self) -> usize {
        self.table().len()
    }

    /// Number of pending waits carrying `correlation`.
    pub fn pending_for(&self, correlation: &str) -> usize {
        self.table().iter().filter(|w| w.correlation.as_deref() == Some(correlation)).count()
    }

    /// Time left before wait `id` expires, if it is still pending.
    pub fn remaining(&self, id: WaitId) -> Option<Duration> {
        self.table()
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.deadline.saturating_duration_since(Instant::now()))
    }

    /// Drop every pending wait without running callbacks and cancel their
    /// timers. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<PendingWait> = self.table().drain(..).collect();
        let count = drained.len();
        for mut wait in drained {
            wait.cancel_timer();
        }
        if count > 0 {
            debug!(count, "Dropped pending waits at shutdown");
        }
        count
    }

    fn expire(&self, id: WaitId) {
        let expired = {
            let mut table = self.table();
            let position = table.iter().position(|w| w.id == id);
            position.map(|i| table.remove(i))
        };

        if let Some(wait) = expired {
            trace!(wait = %wait.id, "Pending wait timed out");
            wait.fire_timeout();
        }
    }
}

/// Run `f`, logging and swallowing a panic.
fn contained<R>(wait: WaitId, stage: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(wait = %wait, stage, panic = %panic_message(payload), "Pending wait callback panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Actor, ChannelRef, MessageId, ReactionEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reaction(message: u64, user: u64, emoji: &str) -> InboundEvent {
        InboundEvent::ReactionAdded(ReactionEvent {
            message: MessageId(message),
            channel: ChannelRef::new(1, "general", None),
            guild: None,
            actor: Actor::new(user, "someone"),
            emoji: emoji.to_string(),
        })
    }

    fn on_message(id: u64) -> impl Fn(&InboundEvent) -> bool + Send + Sync + 'static {
        move |event: &InboundEvent| event.as_reaction().is_some_and(|r| r.message == MessageId(id))
    }

    struct Counters {
        matched: Arc<AtomicUsize>,
        timed_out: Arc<AtomicUsize>,
    }

    impl Counters {
        fn new() -> Self {
            Self { matched: Arc::default(), timed_out: Arc::default() }
        }

        fn register(&self, waiter: &Arc<InteractionWaiter>, message: u64, timeout: Duration) -> WaitId {
            let matched = Arc::clone(&self.matched);
            let timed_out = Arc::clone(&self.timed_out);
            waiter.register(
                EventTag::Reaction,
                on_message(message),
                move |_| {
                    matched.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    timed_out.fetch_add(1, Ordering::SeqCst);
                },
                timeout,
            )
        }

        fn counts(&self) -> (usize, usize) {
            (self.matched.load(Ordering::SeqCst), self.timed_out.load(Ordering::SeqCst))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_with_non_matching_event_times_out_once() {
        let waiter = InteractionWaiter::new();
        let counters = Counters::new();
        counters.register(&waiter, 1, Duration::ZERO);

        assert!(!waiter.deliver(&reaction(2, 9, "▶")));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(counters.counts(), (0, 1));
        assert_eq!(waiter.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn match_then_deadline_runs_on_match_only() {
        let waiter = InteractionWaiter::new();
        let counters = Counters::new();
        counters.register(&waiter, 1, Duration::from_secs(5));

        assert!(waiter.deliver(&reaction(1, 9, "▶")));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counters.counts(), (1, 0));
        // A second matching event finds nothing.
        assert!(!waiter.deliver(&reaction(1, 9, "▶")));
        assert_eq!(counters.counts(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_consumes_first_match_only() {
        let waiter = InteractionWaiter::new();
        let first = Counters::new();
        let second = Counters::new();
        first.register(&waiter, 1, Duration::from_secs(5));
        second.register(&waiter, 1, Duration::from_secs(5));

        assert!(waiter.deliver(&reaction(1, 9, "▶")));
        assert_eq!(first.counts(), (1, 0));
        assert_eq!(second.counts(), (0, 0));
        assert_eq!(waiter.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_all_consumes_every_match() {
        let waiter = InteractionWaiter::new();
        let first = Counters::new();
        let second = Counters::new();
        let other = Counters::new();
        first.register(&waiter, 1, Duration::from_secs(5));
        second.register(&waiter, 1, Duration::from_secs(5));
        other.register(&waiter, 2, Duration::from_secs(5));

        assert_eq!(waiter.deliver_all(&reaction(1, 9, "▶")), 2);
        assert_eq!(waiter.pending(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(first.counts(), (1, 0));
        assert_eq!(second.counts(), (1, 0));
        assert_eq!(other.counts(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn other_tags_are_not_tested() {
        let waiter = InteractionWaiter::new();
        let counters = Counters::new();
        counters.register(&waiter, 1, Duration::from_secs(5));
        assert!(!waiter.deliver(&InboundEvent::Shutdown));
        assert_eq!(waiter.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_waits_without_callbacks() {
        let waiter = InteractionWaiter::new();
        let counters = Counters::new();
        counters.register(&waiter, 1, Duration::from_secs(5));

        assert_eq!(waiter.shutdown(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counters.counts(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn next_event_resolves_on_match_and_timeout() {
        let waiter = InteractionWaiter::new();

        let pending = {
            let waiter = Arc::clone(&waiter);
            tokio::spawn(async move {
                waiter.next_event(EventTag::Reaction, on_message(3), Duration::from_secs(5)).await
            })
        };
        tokio::task::yield_now().await;
        assert!(waiter.deliver(&reaction(3, 9, "▶")));
        let event = pending.await.unwrap().unwrap();
        assert_eq!(event.as_reaction().unwrap().message, MessageId(3));

        let timed_out =
            waiter.next_event(EventTag::Reaction, on_message(4), Duration::from_secs(1)).await;
        assert!(timed_out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_predicate_is_a_non_match() {
        let waiter = InteractionWaiter::new();
        waiter.register(
            EventTag::Reaction,
            |_event: &InboundEvent| -> bool { panic!("bad predicate") },
            |_| {},
            || {},
            Duration::from_secs(5),
        );
        let counters = Counters::new();
        counters.register(&waiter, 1, Duration::from_secs(5));

        assert!(waiter.deliver(&reaction(1, 9, "▶")));
        assert_eq!(counters.counts(), (1, 0));
        assert_eq!(waiter.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callbacks_still_consume_their_wait() {
        let waiter = InteractionWaiter::new();
        waiter.register(
            EventTag::Reaction,
            on_message(1),
            |_| panic!("on_match exploded"),
            || {},
            Duration::from_secs(5),
        );
        waiter.register(
            EventTag::Reaction,
            on_message(2),
            |_| {},
            || panic!("on_timeout exploded"),
            Duration::from_secs(1),
        );

        assert!(waiter.deliver(&reaction(1, 9, "▶")));
        assert!(!waiter.deliver(&reaction(1, 9, "▶")));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(waiter.pending(), 0);

        // The table is still usable afterwards.
        let counters = Counters::new();
        counters.register(&waiter, 3, Duration::from_secs(5));
        assert!(waiter.deliver(&reaction(3, 9, "▶")));
        assert_eq!(counters.counts(), (1, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_match_and_timeout_fire_exactly_once() {
        const WAITS: u64 = 500;
        let waiter = InteractionWaiter::new();
        let matched: Arc<Vec<AtomicUsize>> = Arc::new((0..WAITS).map(|_| AtomicUsize::new(0)).collect());
        let timed_out: Arc<Vec<AtomicUsize>> = Arc::new((0..WAITS).map(|_| AtomicUsize::new(0)).collect());

        for i in 0..WAITS {
            let matched = Arc::clone(&matched);
            let timed_out = Arc::clone(&timed_out);
            waiter.register(
                EventTag::Reaction,
                on_message(i),
                move |_| {
                    matched[i as usize].fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    timed_out[i as usize].fetch_add(1, Ordering::SeqCst);
                },
                Duration::from_millis(1 + i % 3),
            );
        }

        let deliverers: Vec<_> = (0..2)
            .map(|half| {
                let waiter = Arc::clone(&waiter);
                tokio::spawn(async move {
                    for i in (half..WAITS).step_by(2) {
                        waiter.deliver(&reaction(i, 9, "▶"));
                    }
                })
            })
            .collect();
        for task in deliverers {
            task.await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(waiter.pending(), 0);
        let mut total = 0;
        for i in 0..WAITS as usize {
            let m = matched[i].load(Ordering::SeqCst);
            let t = timed_out[i].load(Ordering::SeqCst);
            assert_eq!(m + t, 1, "wait {i} fired {m} matches and {t} timeouts");
            total += m + t;
        }
        assert_eq!(total, WAITS as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn correlation_and_remaining_time() {
        let waiter = InteractionWaiter::new();
        let id = waiter.register_correlated(
            Some("10:20".into()),
            EventTag::Reaction,
            |_| false,
            |_| {},
            || {},
            Duration::from_secs(30),
        );
        assert_eq!(waiter.pending_for("10:20"), 1);
        assert_eq!(waiter.pending_for("10:21"), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(waiter.remaining(id), Some(Duration::from_secs(20)));
    }
}
