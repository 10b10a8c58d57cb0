//! Ingestion events.
//!
//! The store emits one [`StoreEvent`] after every successful `visit_*`
//! call except `visit_metadata`. Subscribers run synchronously, in
//! registration order, on the ingesting thread.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// What was ingested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum StoreEvent {
    TestResult(String),
    Fixture(String),
    AttachmentFile(String),
}

impl StoreEvent {
    /// Id of the ingested record.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::TestResult(id) | Self::Fixture(id) | Self::AttachmentFile(id) => id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TestResult(_) => "testResult",
            Self::Fixture(_) => "fixture",
            Self::AttachmentFile(_) => "attachmentFile",
        }
    }
}

/// Event callback.
pub type Subscriber = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Registered subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn subscribe(&mut self, subscriber: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn emit(&self, event: &StoreEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Subscriber that records every event, for tests and progress reporting.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber feeding this log.
    #[must_use]
    pub fn subscriber(&self) -> impl Fn(&StoreEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &StoreEvent| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }
    }

    /// Snapshot of recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
