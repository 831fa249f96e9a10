#![allow(dead_code)]

use futures::channel::mpsc as futures_mpsc;
use futures::{SinkExt, StreamExt};
use office_transport::types::{ConnectionStatus, ConnectionUpdate, Envelope};
use office_transport::{
    Connector, EventBus, LinkConfig, LinkError, LinkResult, WireConnection, WireFrame,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const WAIT: Duration = Duration::from_secs(2);

pub enum Outcome {
    Accept,
    Refuse(&'static str),
}

/// Backend side of one accepted fake connection.
pub struct FakeServer {
    pub url: String,
    to_client: mpsc::UnboundedSender<LinkResult<WireFrame>>,
    from_client: futures_mpsc::UnboundedReceiver<WireFrame>,
}

impl FakeServer {
    pub fn push_text(&self, text: &str) {
        let _ = self.to_client.send(Ok(WireFrame::Text(text.to_string())));
    }

    pub fn push_binary(&self, bytes: &[u8]) {
        let _ = self.to_client.send(Ok(WireFrame::Binary(bytes.to_vec())));
    }

    /// Orderly close initiated by the backend.
    pub fn close(&self) {
        let _ = self.to_client.send(Ok(WireFrame::Close));
    }

    /// Transport failure on the read side.
    pub fn fail(&self, detail: &str) {
        let _ = self
            .to_client
            .send(Err(LinkError::WebSocket(detail.to_string())));
    }

    pub async fn next_sent(&mut self) -> Option<WireFrame> {
        tokio::time::timeout(WAIT, self.from_client.next())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_sent_text(&mut self) -> String {
        match self.next_sent().await {
            Some(WireFrame::Text(text)) => text,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

/// Connector that follows a script of outcomes (accepting once the script
/// runs out) and hands every accepted connection's backend side to the test.
pub struct FakeConnector {
    attempts: AtomicUsize,
    script: Mutex<VecDeque<Outcome>>,
    servers: mpsc::UnboundedSender<FakeServer>,
}

impl FakeConnector {
    pub fn new(script: Vec<Outcome>) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            servers,
        });
        (connector, accepted)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> LinkResult<WireConnection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Outcome::Accept);
        if let Outcome::Refuse(detail) = outcome {
            return Err(LinkError::Connect(detail.to_string()));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = futures_mpsc::unbounded();
        let _ = self.servers.send(FakeServer {
            url: url.to_string(),
            to_client,
            from_client,
        });

        Ok(WireConnection {
            sink: Box::pin(client_tx.sink_map_err(|_| LinkError::Closed)),
            stream: UnboundedReceiverStream::new(client_rx).boxed(),
        })
    }
}

pub fn test_config() -> LinkConfig {
    LinkConfig::with_base_url("ws://office.test/ws")
}

pub async fn next_server(accepted: &mut mpsc::UnboundedReceiver<FakeServer>) -> FakeServer {
    tokio::time::timeout(WAIT, accepted.recv())
        .await
        .expect("connection attempt should be accepted in time")
        .expect("connector dropped")
}

pub fn record_status(bus: &EventBus) -> mpsc::UnboundedReceiver<ConnectionUpdate> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.on_typed::<ConnectionUpdate, _>(move |update| {
        let _ = tx.send(update);
        Ok(())
    });
    rx
}

pub fn record_envelopes(bus: &EventBus) -> mpsc::UnboundedReceiver<Envelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.on_any(move |envelope| {
        let _ = tx.send(envelope.clone());
        Ok(())
    });
    rx
}

pub async fn next_status(rx: &mut mpsc::UnboundedReceiver<ConnectionUpdate>) -> ConnectionUpdate {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("connection event should arrive in time")
        .expect("status recorder dropped")
}

pub async fn expect_status(
    rx: &mut mpsc::UnboundedReceiver<ConnectionUpdate>,
    expected: ConnectionStatus,
) -> ConnectionUpdate {
    let update = next_status(rx).await;
    assert_eq!(update.status, expected, "unexpected connection event: {:?}", update);
    update
}

pub async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event should arrive in time")
        .expect("envelope recorder dropped")
}
