//! In-process event bus
//!
//! Events are queued on an unbounded channel and each one is handled on its
//! own task. Delivery is at-most-once: a handler failure is logged and the
//! event is dropped.

use super::{Event, EventPublisher, EventResolver};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Publishing side of the bus
#[derive(Clone)]
pub struct LocalEventBus {
    tx: mpsc::UnboundedSender<Event>,
    pending: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

/// Receiving side; consumed by `run`
pub struct EventDispatcher {
    rx: mpsc::UnboundedReceiver<Event>,
    pending: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl LocalEventBus {
    pub fn new() -> (Self, EventDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                pending: pending.clone(),
                failures: failures.clone(),
            },
            EventDispatcher {
                rx,
                pending,
                failures,
            },
        )
    }

    /// Events published but not yet fully handled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Handler failures since startup
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for LocalEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        debug!("Publishing event {} on {}", event.event_id, event.topic);
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(event).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            Error::Event(format!("Event bus closed; dropped event {}", e.0.event_id))
        })
    }
}

impl EventDispatcher {
    /// Spawn the dispatch loop. It runs until every publisher is dropped.
    pub fn run(self, resolver: Arc<EventResolver>) -> JoinHandle<()> {
        let EventDispatcher {
            mut rx,
            pending,
            failures,
        } = self;

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let resolver = resolver.clone();
                let pending = pending.clone();
                let failures = failures.clone();
                tokio::spawn(async move {
                    let event_id = event.event_id;
                    let topic = event.topic;
                    if let Err(e) = resolver.process_event(event).await {
                        failures.fetch_add(1, Ordering::SeqCst);
                        error!("Handler for {} failed on event {}: {}", topic, event_id, e);
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                });
            }
            debug!("Event bus closed");
        })
    }
}
