//! Connection manager
//!
//! Owns at most one live connection to the backend event stream and keeps it
//! alive: any closure that was not requested through `close()` leads to a new
//! `connect()` after the configured fixed delay, indefinitely.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --opened--> Connected
//!      ^                          |                     |
//!      |<------failed-------------+                     |
//!      |<------closed / errored-------------------------+
//! Connecting|Connected --close()--> Closing --wound down--> Disconnected (terminal)
//! ```
//!
//! All failure reporting goes through the `connection` event on the bus;
//! nothing here returns an error to the caller once the manager exists.

use crate::adapters::WebSocketConnector;
use crate::codec::{self, Outbound};
use crate::config::LinkConfig;
use crate::errors::LinkResult;
use crate::event_bus::EventBus;
use crate::identity::ClientId;
use crate::scheduler::{ScheduleHandle, Scheduler, TokioScheduler};
use crate::traits::{Connector, WireConnection, WireFrame};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use office_core_types::{Command, ConnectionState, ConnectionUpdate};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const FRAME_PREVIEW_CHARS: usize = 200;

enum OutboundFrame {
    Text(String),
    Close,
}

struct Inner {
    state: ConnectionState,
    /// Cleared by `close()` and never set again.
    should_reconnect: bool,
    /// Bumped per attempt; notifications from older attempts are ignored.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    retry: Option<ScheduleHandle>,
}

struct Shared {
    config: LinkConfig,
    client_id: ClientId,
    endpoint: String,
    bus: Arc<EventBus>,
    connector: Arc<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    inner: Mutex<Inner>,
}

/// Cheap to clone; clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// WebSocket transport with tokio-timed reconnects.
    pub fn new(config: LinkConfig, bus: Arc<EventBus>) -> LinkResult<Self> {
        Self::with_parts(
            config,
            bus,
            Arc::new(WebSocketConnector),
            Arc::new(TokioScheduler),
        )
    }

    pub fn with_parts(
        config: LinkConfig,
        bus: Arc<EventBus>,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
    ) -> LinkResult<Self> {
        let client_id = ClientId::with_prefix(&config.client_id_prefix);
        Self::with_client_id(config, bus, connector, scheduler, client_id)
    }

    pub fn with_client_id(
        config: LinkConfig,
        bus: Arc<EventBus>,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
        client_id: ClientId,
    ) -> LinkResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint_for(&client_id);
        debug!(
            "Connection manager created: client_id={}, endpoint={}",
            client_id, endpoint
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                client_id,
                endpoint,
                bus,
                connector,
                scheduler,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    should_reconnect: true,
                    generation: 0,
                    outbound: None,
                    retry: None,
                }),
            }),
        })
    }

    pub fn client_id(&self) -> &ClientId {
        &self.shared.client_id
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock_inner().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Starts a connection attempt unless one is already in progress or live.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        Shared::connect(&self.shared, false);
    }

    /// Stops reconnecting for good and winds down the live connection.
    pub fn close(&self) {
        let mut inner = self.shared.lock_inner();
        inner.should_reconnect = false;
        if let Some(retry) = inner.retry.take() {
            retry.cancel();
        }

        info!(
            "Closing event stream connection: client_id={}, state={:?}",
            self.shared.client_id, inner.state
        );
        match inner.state {
            ConnectionState::Connected => {
                inner.state = ConnectionState::Closing;
                if let Some(outbound) = &inner.outbound {
                    let _ = outbound.send(OutboundFrame::Close);
                }
            }
            // the connection task closes the socket as soon as it opens
            ConnectionState::Connecting => inner.state = ConnectionState::Closing,
            ConnectionState::Closing | ConnectionState::Disconnected => {}
        }
    }

    /// Hands `message` to the live connection. While not connected the
    /// message is logged and dropped; nothing is queued. Returns whether the
    /// message was handed over.
    pub fn send(&self, message: impl Into<Outbound>) -> bool {
        let message = message.into();
        let text = match codec::encode(&message) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode outbound message: kind={}, error={}", message.describe(), e);
                return false;
            }
        };

        let inner = self.shared.lock_inner();
        match (&inner.state, &inner.outbound) {
            (ConnectionState::Connected, Some(outbound)) => {
                if outbound.send(OutboundFrame::Text(text)).is_err() {
                    error!(
                        "Connection task is gone, dropping message: kind={}",
                        message.describe()
                    );
                    return false;
                }
                debug!("Message sent: kind={}", message.describe());
                true
            }
            (state, _) => {
                error!(
                    "Event stream not connected, dropping message: kind={}, state={:?}",
                    message.describe(),
                    state
                );
                false
            }
        }
    }

    pub fn subscribe_project(&self, project_id: &str) -> bool {
        self.send(Command::subscribe_project(project_id))
    }

    pub fn unsubscribe_project(&self, project_id: &str) -> bool {
        self.send(Command::unsubscribe_project(project_id))
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(this: &Arc<Self>, scheduled: bool) {
        let generation = {
            let mut inner = this.lock_inner();
            if !inner.should_reconnect {
                if scheduled {
                    debug!("Scheduled reconnect skipped, connection was closed");
                } else {
                    warn!(
                        "Connect ignored, connection manager was closed: client_id={}",
                        this.client_id
                    );
                }
                return;
            }
            if inner.state != ConnectionState::Disconnected {
                debug!("Connect skipped: state={:?}", inner.state);
                return;
            }
            inner.state = ConnectionState::Connecting;
            inner.generation += 1;
            if let Some(retry) = inner.retry.take() {
                retry.cancel();
            }
            inner.generation
        };

        info!(
            "Connecting to event stream: url={}, attempt={}",
            this.endpoint, generation
        );
        let shared = this.clone();
        tokio::spawn(async move {
            shared.run_connection(generation).await;
        });
    }

    async fn run_connection(self: Arc<Self>, generation: u64) {
        let connection = match self.connector.connect(&self.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(
                    "Event stream connection failed: url={}, error={}",
                    self.endpoint, e
                );
                self.finish(generation, Some(e.to_string()));
                return;
            }
        };
        let WireConnection {
            mut sink,
            mut stream,
        } = connection;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        if !self.mark_connected(generation, outbound_tx) {
            debug!("Connection opened after close() was requested, closing it");
            let _ = sink.send(WireFrame::Close).await;
            self.finish(generation, None);
            return;
        }
        info!("Event stream connected: url={}", self.endpoint);
        self.emit_status(ConnectionUpdate::connected());

        let mut heartbeat = self.config.heartbeat_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let failure = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(WireFrame::Text(text))) => self.deliver(codec::decode_text(&text), &text),
                    Some(Ok(WireFrame::Binary(bytes))) => {
                        self.deliver(codec::decode_binary(&bytes), &String::from_utf8_lossy(&bytes))
                    }
                    Some(Ok(WireFrame::Close)) => {
                        info!("Event stream closed by backend");
                        break None;
                    }
                    Some(Err(e)) => {
                        warn!("Event stream read failed: error={}", e);
                        break Some(e.to_string());
                    }
                    None => {
                        info!("Event stream ended");
                        break None;
                    }
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(e) = sink.send(WireFrame::Text(text)).await {
                            warn!("Event stream write failed: error={}", e);
                            break Some(e.to_string());
                        }
                    }
                    Some(OutboundFrame::Close) | None => {
                        if let Err(e) = sink.send(WireFrame::Close).await {
                            debug!("Close frame not delivered: error={}", e);
                        }
                        break None;
                    }
                },
                _ = next_heartbeat(&mut heartbeat) => {
                    if let Ok(ping) = codec::encode(&Command::ping().into()) {
                        if let Err(e) = sink.send(WireFrame::Text(ping)).await {
                            warn!("Heartbeat failed: error={}", e);
                            break Some(e.to_string());
                        }
                    }
                }
            }
        };

        self.finish(generation, failure);
    }

    fn mark_connected(
        &self,
        generation: u64,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
    ) -> bool {
        let mut inner = self.lock_inner();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            return false;
        }
        inner.state = ConnectionState::Connected;
        inner.outbound = Some(outbound);
        true
    }

    /// Inline dispatch keeps delivery in receipt order.
    fn deliver(&self, decoded: LinkResult<office_core_types::Envelope>, raw: &str) {
        match decoded {
            Ok(envelope) => {
                debug!("Event received: event={}", envelope.event);
                self.bus.dispatch(&envelope);
            }
            Err(e) => {
                error!(
                    "Dropping malformed frame: error={}, frame={}",
                    e,
                    codec::preview(raw, FRAME_PREVIEW_CHARS)
                );
            }
        }
    }

    fn finish(self: &Arc<Self>, generation: u64, failure: Option<String>) {
        {
            let mut inner = self.lock_inner();
            if inner.generation != generation {
                debug!("Ignoring close of superseded connection: generation={}", generation);
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.outbound = None;
        }

        if let Some(detail) = failure {
            self.emit_status(ConnectionUpdate::error(detail));
        }
        self.emit_status(ConnectionUpdate::disconnected());
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let mut inner = self.lock_inner();
        if !inner.should_reconnect {
            info!("Event stream closed deliberately, not reconnecting");
            return;
        }
        // a subscriber may already have reconnected from the disconnected event
        if inner.state != ConnectionState::Disconnected {
            return;
        }

        let delay = self.config.reconnect_interval();
        info!("Reconnecting to event stream in {}ms", delay.as_millis());
        let weak: Weak<Shared> = Arc::downgrade(self);
        let handle = self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    Shared::connect(&shared, true);
                }
            }),
        );
        if let Some(previous) = inner.retry.replace(handle) {
            previous.cancel();
        }
    }

    fn emit_status(&self, update: ConnectionUpdate) {
        let report = self.bus.trigger_payload(&update);
        if !report.is_clean() {
            debug!(
                "Connection status subscribers failed: status={:?}, failures={}",
                update.status,
                report.failures.len()
            );
        }
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
