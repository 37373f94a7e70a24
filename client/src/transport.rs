//! Self-healing connection to the game server.
//!
//! The channel owns at most one live connection. Inbound frames go straight
//! into the [`InboundQueue`] without inspection; outbound actions are accepted
//! only while the connection is open. When the connection drops for any
//! reason, a reconnect is scheduled after a fixed delay unless the owner has
//! called [`TransportChannel::disconnect`].
//!
//! Internally the channel is a small state machine guarded by one mutex:
//!
//! ```text
//! Idle ──connect()──▶ Connecting ──ok──▶ Open
//!                         │               │
//!                       error           closed
//!                         ▼               ▼
//!                       Closed ◀──────────┘
//!                         │ (timer, fixed delay)
//!                         └──────▶ Connecting
//!
//! any state ──disconnect()──▶ ShuttingDown
//! ```
//!
//! Every attempt carries a generation number. Tasks from an older generation
//! may still finish after a disconnect or a newer attempt, but they never touch
//! the current state.

use crate::config::ClientConfig;
use crate::queue::InboundQueue;
use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientAction;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("could not encode action: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport needs a Tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Connectivity as seen by the rest of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Both halves of an established connection.
pub struct Link {
    pub outgoing: FrameSink,
    pub incoming: FrameStream,
}

/// Opens connections. The channel only depends on this seam so its state
/// machine can run against an in-memory peer.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, target: String) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// Production connector speaking WebSocket text frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, target: String) -> BoxFuture<'static, Result<Link, TransportError>> {
        Box::pin(async move {
            let (socket, _response) = connect_async(target.as_str()).await?;
            let (sink, stream) = socket.split();

            let outgoing = sink.with(|frame: String| {
                future::ready(Ok::<Message, TransportError>(Message::Text(frame)))
            });

            let incoming = stream.filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => {
                        Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    // Control frames are handled by tungstenite itself
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            });

            Ok(Link {
                outgoing: Box::pin(outgoing),
                incoming: incoming.boxed(),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Connecting,
    Open,
    Closed,
    ShuttingDown,
}

struct ChannelState {
    lifecycle: Lifecycle,
    generation: u64,
    failed_attempts: u32,
    outbound: Option<mpsc::UnboundedSender<String>>,
    connection_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Shared {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    inbound: InboundQueue,
    runtime: Handle,
    state: Mutex<ChannelState>,
}

/// Owner of the single connection to the game server.
///
/// Dropping the channel behaves like [`disconnect`](Self::disconnect).
pub struct TransportChannel {
    shared: Arc<Shared>,
}

impl TransportChannel {
    /// Creates an idle channel. Must be called from within a Tokio runtime
    /// context; the runtime is captured for all background work.
    pub fn new(
        config: ClientConfig,
        connector: impl Connector,
    ) -> Result<Self, TransportError> {
        let runtime = Handle::try_current()?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                connector: Box::new(connector),
                inbound: InboundQueue::new(),
                runtime,
                state: Mutex::new(ChannelState {
                    lifecycle: Lifecycle::Idle,
                    generation: 0,
                    failed_attempts: 0,
                    outbound: None,
                    connection_task: None,
                    reconnect_timer: None,
                }),
            }),
        })
    }

    /// Starts a connection attempt unless one is already in flight, scheduled,
    /// or open. Returns immediately; progress is visible through [`state`](Self::state).
    pub fn connect(&self) {
        let mut state = self.shared.lock();
        match state.lifecycle {
            Lifecycle::Connecting | Lifecycle::Open => {
                debug!("connect() ignored, connection is {:?}", state.lifecycle);
                return;
            }
            Lifecycle::Closed if state.reconnect_timer.is_some() => {
                debug!("connect() ignored, reconnection already scheduled");
                return;
            }
            _ => {}
        }

        self.shared.start_attempt(&mut state);
    }

    /// Stops the connection for good: cancels any scheduled reconnect, closes
    /// the live connection, and disables automatic recovery. Safe to call any
    /// number of times, in any state.
    pub fn disconnect(&self) {
        let mut state = self.shared.lock();

        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = state.connection_task.take() {
            // An open connection is closed gracefully once its sender is gone
            if state.lifecycle == Lifecycle::Connecting {
                task.abort();
            }
        }
        state.outbound = None;
        state.generation += 1;

        if state.lifecycle != Lifecycle::ShuttingDown {
            info!("Disconnecting from {}", self.shared.config.server_url);
        }
        state.lifecycle = Lifecycle::ShuttingDown;
    }

    /// Serializes and transmits one action. Returns `false` (and logs) when the
    /// connection is not open or the action cannot be encoded.
    pub fn send(&self, action: &ClientAction) -> bool {
        let state = self.shared.lock();

        let outbound = match (&state.outbound, state.lifecycle) {
            (Some(outbound), Lifecycle::Open) => outbound,
            _ => {
                warn!("Connection is not open. Cannot send {:?}", action);
                return false;
            }
        };

        match action.to_frame() {
            Ok(frame) => outbound.send(frame).is_ok(),
            Err(e) => {
                error!("Error encoding {:?}: {}", action, e);
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.shared.lock().lifecycle {
            Lifecycle::Connecting => ConnectionState::Connecting,
            Lifecycle::Open => ConnectionState::Open,
            Lifecycle::Idle | Lifecycle::Closed | Lifecycle::ShuttingDown => {
                ConnectionState::Closed
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Consecutive failed or dropped connections since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().failed_attempts
    }

    /// Handle to the queue every received frame is appended to.
    pub fn inbound(&self) -> &InboundQueue {
        &self.shared.inbound
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_attempt(self: &Arc<Self>, state: &mut ChannelState) {
        state.generation += 1;
        state.lifecycle = Lifecycle::Connecting;
        state.reconnect_timer = None;

        let generation = state.generation;
        let shared = Arc::clone(self);
        state.connection_task = Some(
            self.runtime
                .spawn(async move { shared.run_connection(generation).await }),
        );
    }

    async fn run_connection(self: Arc<Self>, generation: u64) {
        info!("Connecting to {}...", self.config.server_url);

        let link = match self.connector.connect(self.config.connection_target()).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                self.handle_closed(generation);
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("Dropping connection from superseded attempt {}", generation);
                return;
            }
            state.lifecycle = Lifecycle::Open;
            state.failed_attempts = 0;
            state.outbound = Some(outbound_tx);
        }
        info!("Connected to {}", self.config.server_url);

        self.pump(link, outbound_rx).await;
        self.handle_closed(generation);
    }

    /// Moves frames in both directions until either side goes away.
    async fn pump(&self, link: Link, mut outbound_rx: mpsc::UnboundedReceiver<String>) {
        let Link {
            mut outgoing,
            mut incoming,
        } = link;

        loop {
            tokio::select! {
                frame = incoming.next() => match frame {
                    Some(Ok(text)) => self.inbound.push(text),
                    Some(Err(e)) => {
                        warn!("Transport error: {}", e);
                        break;
                    }
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                },

                action = outbound_rx.recv() => match action {
                    Some(frame) => {
                        if let Err(e) = outgoing.send(frame).await {
                            warn!("Error sending frame: {}", e);
                            break;
                        }
                    }
                    None => {
                        if let Err(e) = outgoing.close().await {
                            debug!("Error closing connection: {}", e);
                        }
                        break;
                    }
                },
            }
        }
    }

    fn handle_closed(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.lifecycle == Lifecycle::ShuttingDown {
            return;
        }

        state.lifecycle = Lifecycle::Closed;
        state.outbound = None;
        state.connection_task = None;
        state.failed_attempts = state.failed_attempts.saturating_add(1);

        let delay = self.config.reconnect_delay;
        info!(
            "Reconnecting in {:?} (attempt {})",
            delay, state.failed_attempts
        );

        let shared = Arc::clone(self);
        state.reconnect_timer = Some(self.runtime.spawn(async move {
            sleep(delay).await;
            shared.fire_reconnect(generation);
        }));
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        // A disconnect() racing the timer bumps the generation
        if state.generation != generation || state.lifecycle != Lifecycle::Closed {
            return;
        }
        self.start_attempt(&mut state);
    }
}
