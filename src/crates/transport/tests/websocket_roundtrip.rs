use futures_util::{SinkExt, StreamExt};
use office_transport::types::{AgentMessage, ConnectionStatus, ConnectionUpdate};
use office_transport::{ConnectionManager, EventBus, LinkConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn websocket_connection_delivers_events_and_commands() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept connection");
        let mut socket = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket handshake");

        socket
            .send(Message::Text(
                r#"{"event":"agent_message","data":{"from":"ceo","to":"boss","content":"plan ready"}}"#
                    .to_string(),
            ))
            .await
            .expect("send event");

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("client went away: {:?}", other),
            }
        }
    });

    let bus = Arc::new(EventBus::new());
    let (status_tx, mut status) = mpsc::unbounded_channel();
    bus.on_typed::<ConnectionUpdate, _>(move |update| {
        let _ = status_tx.send(update.status);
        Ok(())
    });
    let (messages_tx, mut messages) = mpsc::unbounded_channel();
    bus.on_typed::<AgentMessage, _>(move |message| {
        let _ = messages_tx.send(message);
        Ok(())
    });

    let config = LinkConfig::with_base_url(format!("ws://{}/ws", addr));
    let manager = ConnectionManager::new(config, bus).expect("valid config");
    manager.connect();

    let connected = tokio::time::timeout(Duration::from_secs(5), status.recv())
        .await
        .expect("connected in time");
    assert_eq!(connected, Some(ConnectionStatus::Connected));

    let message = tokio::time::timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("event in time")
        .expect("agent message");
    assert_eq!(message.from, "ceo");
    assert_eq!(message.content, "plan ready");

    assert!(manager.subscribe_project("p42"));
    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server finished in time")
        .expect("server task");
    assert_eq!(received, r#"{"action":"subscribe_project","project_id":"p42"}"#);

    manager.close();
}
