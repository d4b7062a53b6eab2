use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::event::InboundEvent;

/// Default channel buffer size for inbound events.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// The inbound event bus between the host platform and the framework.
///
/// The host keeps cloning `event_tx` into its gateway handlers; the framework
/// takes the single receiver and drains it on one task.
pub struct EventBus {
    pub event_tx: mpsc::Sender<InboundEvent>,
    pub event_rx: Option<mpsc::Receiver<InboundEvent>>,
}

impl EventBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        info!(buffer_size = buffer, "EventBus initialized");
        Self { event_tx, event_rx: Some(event_rx) }
    }

    /// A sender handle for an event source.
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.event_tx.clone()
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<InboundEvent>> {
        debug!("Event receiver taken");
        self.event_rx.take()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
