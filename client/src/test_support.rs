//! In-memory server peers for exercising the transport without sockets.

use crate::transport::{Connector, Link, TransportError};
use futures_channel::mpsc as fmpsc;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Server side of an in-memory link.
pub struct Peer {
    pub to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
    pub from_client: fmpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn send_text(&self, frame: impl Into<String>) {
        let _ = self.to_client.unbounded_send(Ok(frame.into()));
    }
}

/// Hands every accepted link's server half to the test through a channel
/// and records when each attempt was made.
#[derive(Clone)]
pub struct TestConnector {
    accept: Arc<Mutex<bool>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl TestConnector {
    pub fn new(accept: bool) -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Self {
            accept: Arc::new(Mutex::new(accept)),
            attempts: Arc::new(Mutex::new(Vec::new())),
            peers,
        };
        (connector, peer_rx)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn set_accept(&self, accept: bool) {
        *self.accept.lock().unwrap() = accept;
    }
}

impl Connector for TestConnector {
    fn connect(&self, _target: String) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.attempts.lock().unwrap().push(Instant::now());
        let accept = *self.accept.lock().unwrap();
        let peers = self.peers.clone();

        Box::pin(async move {
            if !accept {
                return Err(TransportError::Closed);
            }
            let (to_client, incoming) = fmpsc::unbounded();
            let (outgoing, from_client) = fmpsc::unbounded();
            let _ = peers.send(Peer {
                to_client,
                from_client,
            });
            Ok(Link {
                outgoing: Box::pin(outgoing.sink_map_err(|_| TransportError::Closed)),
                incoming: incoming.boxed(),
            })
        })
    }
}

/// Polls `condition` on a 1ms tick, panicking after 200 tries.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
