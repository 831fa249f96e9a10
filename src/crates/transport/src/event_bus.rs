//! Event bus
//!
//! Routes envelopes to subscribers synchronously, in arrival order. Tag
//! subscribers receive `data`; wildcard subscribers receive the whole
//! envelope after every tag subscriber has run. Each callback runs in
//! isolation: an `Err` or a panic is recorded in the `DispatchReport` and
//! the remaining callbacks still run.

use log::{error, warn};
use office_core_types::{Envelope, EventKind, EventPayload, WILDCARD_TAG};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type DataHandler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;
type EnvelopeHandler = Arc<dyn Fn(&Envelope) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by every registration, used to remove exactly that one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registration key: a concrete kind or the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventTag {
    Kind(EventKind),
    Any,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTag::Kind(kind) => f.write_str(kind.as_str()),
            EventTag::Any => f.write_str(WILDCARD_TAG),
        }
    }
}

impl From<EventKind> for EventTag {
    fn from(kind: EventKind) -> Self {
        EventTag::Kind(kind)
    }
}

impl From<&str> for EventTag {
    fn from(tag: &str) -> Self {
        if tag == WILDCARD_TAG {
            EventTag::Any
        } else {
            EventTag::Kind(EventKind::from_tag(tag))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    pub subscription: SubscriptionId,
    pub tag: EventTag,
    pub message: String,
}

/// Outcome of one `dispatch` or `trigger` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: String,
    pub delivered: usize,
    pub failures: Vec<SubscriberFailure>,
}

impl DispatchReport {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            delivered: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, subscription: SubscriptionId, tag: &EventTag, outcome: Result<(), String>) {
        self.delivered += 1;
        if let Err(message) = outcome {
            error!(
                "Event subscriber failed: event={}, tag={}, subscription={}, error={}",
                self.event, tag, subscription, message
            );
            self.failures.push(SubscriberFailure {
                subscription,
                tag: tag.clone(),
                message,
            });
        }
    }
}

#[derive(Default)]
struct Registry {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, DataHandler)>>,
    wildcard: Vec<(SubscriptionId, EnvelopeHandler)>,
}

pub struct EventBus {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers `handler` under `tag`; it receives the envelope's `data`.
    /// The wildcard tag `*` files it with the `on_any` subscribers, so it
    /// sees the `data` of every inbound envelope.
    pub fn on<F>(&self, tag: impl Into<EventTag>, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        let mut registry = self.lock();
        match tag.into() {
            EventTag::Kind(kind) => registry
                .by_kind
                .entry(kind)
                .or_default()
                .push((id, Arc::new(handler))),
            EventTag::Any => registry.wildcard.push((
                id,
                Arc::new(move |envelope: &Envelope| handler(&envelope.data)),
            )),
        }
        id
    }

    /// Registers `handler` for every inbound envelope.
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.lock().wildcard.push((id, Arc::new(handler)));
        id
    }

    /// Like `on`, but decodes `data` into `P` first. A payload that does not
    /// match `P` counts as a failure of this subscriber.
    pub fn on_typed<P, F>(&self, handler: F) -> SubscriptionId
    where
        P: EventPayload,
        F: Fn(P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on(P::KIND, move |data: &Value| {
            let payload = P::deserialize(data).map_err(|e| {
                anyhow::anyhow!("Payload does not match {}: {}", P::KIND, e)
            })?;
            handler(payload)
        })
    }

    /// Removes one registration, or every registration under `tag` when `id`
    /// is `None`. Returns how many were removed.
    pub fn off(&self, tag: impl Into<EventTag>, id: Option<SubscriptionId>) -> usize {
        let tag = tag.into();
        let mut registry = self.lock();
        match (tag, id) {
            (EventTag::Any, Some(id)) => remove_by_id(&mut registry.wildcard, id),
            (EventTag::Any, None) => std::mem::take(&mut registry.wildcard).len(),
            (EventTag::Kind(kind), Some(id)) => {
                let Some(handlers) = registry.by_kind.get_mut(&kind) else {
                    return 0;
                };
                let removed = remove_by_id(handlers, id);
                if handlers.is_empty() {
                    registry.by_kind.remove(&kind);
                }
                removed
            }
            (EventTag::Kind(kind), None) => registry
                .by_kind
                .remove(&kind)
                .map(|handlers| handlers.len())
                .unwrap_or(0),
        }
    }

    pub fn subscriber_count(&self, tag: impl Into<EventTag>) -> usize {
        let registry = self.lock();
        match tag.into() {
            EventTag::Any => registry.wildcard.len(),
            EventTag::Kind(kind) => registry.by_kind.get(&kind).map_or(0, Vec::len),
        }
    }

    /// Delivers an inbound envelope: tag subscribers get `data`, then
    /// wildcard subscribers get the envelope.
    pub fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let kind = envelope.kind();
        let (handlers, wildcard) = {
            let registry = self.lock();
            (
                registry.by_kind.get(&kind).cloned().unwrap_or_default(),
                registry.wildcard.clone(),
            )
        };

        let mut report = DispatchReport::new(&envelope.event);
        let tag = EventTag::Kind(kind);
        for (id, handler) in handlers {
            report.record(id, &tag, invoke(|| handler(&envelope.data)));
        }
        for (id, handler) in wildcard {
            report.record(id, &EventTag::Any, invoke(|| handler(envelope)));
        }
        report
    }

    /// Delivers a locally generated event to its tag subscribers only.
    pub fn trigger(&self, kind: EventKind, data: &Value) -> DispatchReport {
        let handlers = self.lock().by_kind.get(&kind).cloned().unwrap_or_default();

        let mut report = DispatchReport::new(kind.as_str());
        let tag = EventTag::Kind(kind);
        for (id, handler) in handlers {
            report.record(id, &tag, invoke(|| handler(data)));
        }
        report
    }

    /// Serializes `payload` and triggers it under its own kind.
    pub fn trigger_payload<P: EventPayload>(&self, payload: &P) -> DispatchReport {
        match serde_json::to_value(payload) {
            Ok(data) => self.trigger(P::KIND, &data),
            Err(e) => {
                warn!("Failed to serialize local event: event={}, error={}", P::KIND, e);
                DispatchReport::new(P::KIND.as_str())
            }
        }
    }
}

fn remove_by_id<H>(handlers: &mut Vec<(SubscriptionId, H)>, id: SubscriptionId) -> usize {
    let before = handlers.len();
    handlers.retain(|(existing, _)| *existing != id);
    before - handlers.len()
}

fn invoke<F>(callback: F) -> Result<(), String>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
