//! Inbound event sources feeding a stream cycle.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// What a findings subscription can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Payload of a default (unnamed) event.
    Message(String),
    /// The named end-of-stream event.
    Completed,
    /// The subscription itself failed or ended without the end-of-stream event.
    TransportError(String),
}

impl InboundEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InboundEvent::Message(_))
    }
}

#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next event. Once a terminal event has been returned the
    /// source is not polled again.
    async fn next_event(&mut self) -> InboundEvent;

    /// Releases the underlying subscription.
    async fn close(&mut self);
}

/// Event source fed through an in-process channel; useful for embedding the
/// controller behind a transport it does not own.
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<InboundEvent>,
    closed: bool,
}

pub fn channel_event_source() -> (mpsc::UnboundedSender<InboundEvent>, ChannelEventSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelEventSource { rx, closed: false })
}

impl ChannelEventSource {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> InboundEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => InboundEvent::TransportError("event channel closed".to_string()),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
        self.closed = true;
    }
}
