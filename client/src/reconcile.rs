//! Applies server events to the local replicas in arrival order.
//!
//! One call to [`Reconciler::drain`] is one batch: take a snapshot of the
//! inbound queue, decode and apply every frame in it, then remove exactly that
//! many frames from the head of the queue. Frames that arrive while a batch is
//! running stay queued for the next call. A frame that fails to decode is
//! logged and skipped; it never stops the rest of the batch.

use crate::board::BoardReplica;
use crate::queue::InboundQueue;
use crate::roster::RosterReplica;
use log::{debug, info, warn};
use shared::{decode_frame, GamePhase, ServerEvent};
use tokio::sync::watch;

/// What one drain pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Frames taken off the queue
    pub taken: usize,
    /// Frames decoded and dispatched (including ones that turned out to be no-ops)
    pub applied: usize,
    /// Frames dropped as undecodable
    pub rejected: usize,
}

/// Owner of the board and roster replicas and the game phase.
pub struct Reconciler {
    board: Option<BoardReplica>,
    roster: RosterReplica,
    phase: GamePhase,
    revision: watch::Sender<u64>,
}

impl Reconciler {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            board: None,
            roster: RosterReplica::new(),
            phase: GamePhase::default(),
            revision,
        }
    }

    /// Processes everything queued right now.
    pub fn drain(&mut self, queue: &InboundQueue) -> DrainReport {
        let batch = queue.snapshot();
        if batch.is_empty() {
            return DrainReport::default();
        }

        let mut report = DrainReport {
            taken: batch.len(),
            ..DrainReport::default()
        };
        let mut changed = false;

        for frame in &batch {
            match decode_frame(frame) {
                Ok(event) => {
                    report.applied += 1;
                    changed |= self.apply(event);
                }
                Err(e) => {
                    warn!("Failed to parse incoming message: {}", e);
                    report.rejected += 1;
                }
            }
        }

        queue.remove_processed(batch.len());

        if changed {
            self.revision.send_modify(|revision| *revision += 1);
        }
        report
    }

    /// Applies a single decoded event. Returns whether any replica changed.
    pub fn apply(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::BoardSnapshot(mut snapshot) => {
                let players = snapshot.players.take();
                self.phase = snapshot.phase.unwrap_or_default();

                let board = BoardReplica::from_snapshot(snapshot);
                info!(
                    "Received game board {}x{}, {} cells to reveal",
                    board.width(),
                    board.height(),
                    board.cells_remaining()
                );
                self.board = Some(board);

                if let Some(players) = players {
                    self.roster.replace_all(players);
                }
                true
            }

            ServerEvent::GameStatus(Some(phase)) => {
                if self.phase == phase {
                    return false;
                }
                info!("Game phase changed to {:?}", phase);
                self.phase = phase;
                true
            }

            ServerEvent::GameStatus(None) => {
                debug!("Ignoring unrecognized game status");
                false
            }

            ServerEvent::CellPatch(batch) => {
                let cells_changed = match self.board.as_mut() {
                    Some(board) => board.apply_patch(&batch.cells).changed(),
                    None => {
                        debug!(
                            "No game board yet, skipping {} cell updates",
                            batch.cells.len()
                        );
                        false
                    }
                };
                let roster_changed = self.roster.apply_deltas(&batch.deltas) > 0;
                cells_changed || roster_changed
            }

            ServerEvent::Register(player) => {
                self.roster.register(player);
                true
            }

            ServerEvent::Unregister(id) => self.roster.unregister(&id),

            ServerEvent::Unrecognized(kind) => {
                debug!("Missing message type handler for {:?}", kind);
                false
            }
        }
    }

    pub fn board(&self) -> Option<&BoardReplica> {
        self.board.as_ref()
    }

    pub fn roster(&self) -> &RosterReplica {
        &self.roster
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Bumped once per drain that changed anything.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
