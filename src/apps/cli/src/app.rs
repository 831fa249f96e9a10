//! Composition root: one connection manager, one event bus, and the console
//! consumers wired onto it.

use crate::consumers::{self, Answer, DecisionDesk};
use anyhow::{Context, Result};
use chrono::Local;
use office_transport::types::{
    BossDecision, Command, ConnectionState, ConnectionStatus, ConnectionUpdate, DecisionSubmitted,
    Welcome,
};
use office_transport::{ConnectionManager, EventBus, LinkConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const ACK_WAIT: Duration = Duration::from_secs(3);
const CLOSE_WAIT: Duration = Duration::from_secs(2);

/// What the event bus hands over to the command loop.
#[derive(Debug)]
enum Signal {
    Status(ConnectionStatus),
    Decision(BossDecision),
    Submitted(DecisionSubmitted),
}

/// File, then environment, then the `--url` flag.
pub fn resolve_config(path: Option<&Path>, url: Option<String>) -> Result<LinkConfig> {
    let config = LinkConfig::load_or_default(path)
        .context("Failed to load configuration")?
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(with_url_override(config, url))
}

fn with_url_override(mut config: LinkConfig, url: Option<String>) -> LinkConfig {
    if let Some(url) = url {
        config.base_url = url;
        config.host = None;
    }
    config
}

pub struct App {
    manager: ConnectionManager,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl App {
    pub fn new(config: LinkConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let manager = ConnectionManager::new(config, bus).context("Invalid connection settings")?;
        Ok(Self::from_manager(manager))
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        let (tx, signals) = mpsc::unbounded_channel();
        let bus = manager.event_bus();

        let status_tx = tx.clone();
        bus.on_typed::<ConnectionUpdate, _>(move |update| {
            if let Some(detail) = &update.error {
                warn!("Connection error: {}", detail);
            }
            let _ = status_tx.send(Signal::Status(update.status));
            Ok(())
        });
        let decision_tx = tx.clone();
        bus.on_typed::<BossDecision, _>(move |decision| {
            let _ = decision_tx.send(Signal::Decision(decision));
            Ok(())
        });
        bus.on_typed::<DecisionSubmitted, _>(move |ack| {
            let _ = tx.send(Signal::Submitted(ack));
            Ok(())
        });
        bus.on_typed::<Welcome, _>(|welcome| {
            debug!("Backend welcome: client_id={}, message={}", welcome.client_id, welcome.message);
            Ok(())
        });

        Self { manager, signals }
    }

    fn attach_activity_log(&self) {
        self.manager.event_bus().on_any(|envelope| {
            if let Some(entry) = consumers::describe(envelope) {
                println!("{} {}", Local::now().format("%H:%M:%S"), entry);
            }
            Ok(())
        });
    }

    /// Streams the office activity until Ctrl-C or until the input and the
    /// event stream are both gone.
    pub async fn watch(mut self, project: Option<String>) -> Result<()> {
        self.attach_activity_log();
        info!(
            "Watching event stream: endpoint={}, project={}",
            self.manager.endpoint(),
            project.as_deref().unwrap_or("-")
        );
        self.manager.connect();

        let mut desk = DecisionDesk::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Interrupted, closing connection");
                    break;
                }
                signal = self.signals.recv() => match signal {
                    Some(Signal::Status(status)) => {
                        println!("{}", consumers::badge(status));
                        if status == ConnectionStatus::Connected {
                            if let Some(project_id) = &project {
                                self.manager.subscribe_project(project_id);
                            }
                            if let Some(decision) = desk.current() {
                                println!("{}", DecisionDesk::prompt(decision));
                            }
                        }
                    }
                    Some(Signal::Decision(decision)) => {
                        let was_idle = desk.is_empty();
                        if desk.push(decision) {
                            if was_idle {
                                if let Some(decision) = desk.current() {
                                    println!("{}", DecisionDesk::prompt(decision));
                                }
                            } else {
                                println!("{} decisions waiting for an answer", desk.len());
                            }
                        }
                    }
                    Some(Signal::Submitted(ack)) => {
                        if desk.settle(&ack.decision_id) {
                            debug!("Decision settled elsewhere: decision_id={}", ack.decision_id);
                        }
                    }
                    None => break,
                },
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => self.answer(&mut desk, &line),
                    Ok(None) => {
                        debug!("Standard input closed, decisions can no longer be answered");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read standard input: {}", e);
                        stdin_open = false;
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn answer(&self, desk: &mut DecisionDesk, line: &str) {
        match desk.answer(line) {
            Answer::Choice(command) => {
                if self.manager.send(command) {
                    desk.resolve();
                    if let Some(next) = desk.current() {
                        println!("{}", DecisionDesk::prompt(next));
                    }
                } else {
                    println!("Offline, answer not sent. Try again once the connection is back.");
                }
            }
            Answer::Invalid(reason) => println!("Invalid answer: {}", reason),
            Answer::NothingPending => println!("No decision is waiting for an answer."),
        }
    }

    /// Sends one decision response as soon as the connection is up.
    pub async fn decide(mut self, decision_id: &str, choice: &str, wait: Duration) -> Result<()> {
        self.manager.connect();

        let connected = tokio::time::timeout(wait, self.wait_for_connected()).await;
        if !matches!(connected, Ok(true)) {
            self.shutdown().await;
            anyhow::bail!(
                "Backend not reachable at {} within {}s",
                self.manager.endpoint(),
                wait.as_secs()
            );
        }

        if !self
            .manager
            .send(Command::decision_response(decision_id, choice))
        {
            self.shutdown().await;
            anyhow::bail!("Connection dropped before the decision could be sent");
        }

        match tokio::time::timeout(ACK_WAIT, self.wait_for_ack(decision_id)).await {
            Ok(Some(ack)) if !ack.message.is_empty() => println!("✓ {}", ack.message),
            Ok(Some(_)) => println!("✓ Decision {} recorded", decision_id),
            _ => println!("Decision {} sent", decision_id),
        }

        self.shutdown().await;
        Ok(())
    }

    async fn wait_for_connected(&mut self) -> bool {
        while let Some(signal) = self.signals.recv().await {
            if let Signal::Status(ConnectionStatus::Connected) = signal {
                return true;
            }
        }
        false
    }

    async fn wait_for_ack(&mut self, decision_id: &str) -> Option<DecisionSubmitted> {
        while let Some(signal) = self.signals.recv().await {
            if let Signal::Submitted(ack) = signal {
                if ack.decision_id == decision_id {
                    return Some(ack);
                }
            }
        }
        None
    }

    /// Closes the connection and gives the close frame a moment to leave.
    async fn shutdown(&mut self) {
        self.manager.close();
        if self.manager.state() == ConnectionState::Disconnected {
            return;
        }
        let drained = tokio::time::timeout(CLOSE_WAIT, async {
            while let Some(signal) = self.signals.recv().await {
                if let Signal::Status(ConnectionStatus::Disconnected) = signal {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!("Connection did not confirm close in time");
        }
    }
}
