//! The client session: one transport, one set of replicas, and the rules for
//! when a player's click may turn into an action on the wire.

use crate::board::BoardReplica;
use crate::config::ClientConfig;
use crate::reconcile::{DrainReport, Reconciler};
use crate::roster::RosterReplica;
use crate::transport::{ConnectionState, Connector, TransportChannel, TransportError};
use log::debug;
use shared::{ClientAction, GamePhase};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// What the player interface asked for, in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Reveal { x: u32, y: u32 },
    ToggleFlag { x: u32, y: u32 },
}

impl Intent {
    fn into_action(self) -> ClientAction {
        match self {
            Intent::Reveal { x, y } => ClientAction::Reveal { x, y },
            Intent::ToggleFlag { x, y } => ClientAction::Flag { x, y },
        }
    }
}

/// High-level status for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// No open connection, either still dialing or waiting to retry
    Connecting,
    /// Connected but no board snapshot has arrived
    WaitingForBoard,
    InProgress,
    Ended,
}

pub struct GameClient {
    transport: TransportChannel,
    reconciler: Reconciler,
}

impl GameClient {
    /// Must be called inside a Tokio runtime context.
    pub fn new(config: ClientConfig, connector: impl Connector) -> Result<Self, TransportError> {
        Ok(Self {
            transport: TransportChannel::new(config, connector)?,
            reconciler: Reconciler::new(),
        })
    }

    pub fn start(&self) {
        self.transport.connect();
    }

    pub fn shutdown(&self) {
        self.transport.disconnect();
    }

    /// Applies everything received since the last tick. Call once per frame.
    pub fn tick(&mut self) -> DrainReport {
        self.reconciler.drain(self.transport.inbound())
    }

    /// Forwards an intent to the server if the game accepts input right now.
    ///
    /// Nothing is applied locally; the board only changes when the server's
    /// answer comes back through [`tick`](Self::tick).
    pub fn submit(&self, intent: Intent) -> bool {
        if !self.reconciler.phase().is_in_progress() {
            debug!("Game has ended, ignoring {:?}", intent);
            return false;
        }
        if !self.within_board(intent) {
            debug!("Ignoring {:?} outside the board", intent);
            return false;
        }
        self.transport.send(&intent.into_action())
    }

    pub fn reveal(&self, x: u32, y: u32) -> bool {
        self.submit(Intent::Reveal { x, y })
    }

    pub fn toggle_flag(&self, x: u32, y: u32) -> bool {
        self.submit(Intent::ToggleFlag { x, y })
    }

    fn within_board(&self, intent: Intent) -> bool {
        let (x, y) = match intent {
            Intent::Reveal { x, y } | Intent::ToggleFlag { x, y } => (x as usize, y as usize),
        };
        // Without a board the server is the only judge
        self.reconciler
            .board()
            .map_or(true, |board| x < board.width() && y < board.height())
    }

    pub fn status(&self) -> ClientStatus {
        if self.transport.state() != ConnectionState::Open {
            return ClientStatus::Connecting;
        }
        if self.reconciler.board().is_none() {
            return ClientStatus::WaitingForBoard;
        }
        match self.reconciler.phase() {
            GamePhase::InProgress => ClientStatus::InProgress,
            GamePhase::Ended => ClientStatus::Ended,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.transport.reconnect_attempts()
    }

    pub fn board(&self) -> Option<&BoardReplica> {
        self.reconciler.board()
    }

    pub fn roster(&self) -> &RosterReplica {
        self.reconciler.roster()
    }

    pub fn phase(&self) -> GamePhase {
        self.reconciler.phase()
    }

    pub fn revision(&self) -> u64 {
        self.reconciler.revision()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.reconciler.subscribe()
    }

    /// Seconds since the round started, frozen at zero before the start time.
    pub fn elapsed_secs(&self, now: i64) -> Option<u64> {
        let start = self.board()?.constants().game_start_time?;
        Some(now.saturating_sub(start).max(0) as u64)
    }

    /// Seconds until an ended round restarts.
    pub fn restart_in(&self, now: i64) -> Option<u64> {
        if self.phase().is_in_progress() {
            return None;
        }
        let restart = self.board()?.restart_time()?;
        Some(restart.saturating_sub(now).max(0) as u64)
    }
}

/// Formats seconds as `m:ss`.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}
