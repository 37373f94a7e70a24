//! Local replica of the scoreboard
//!
//! The roster mirrors the server's player table:
//! - Whole-record changes (register, unregister, snapshot replace)
//! - Field-level deltas carried alongside cell updates (score, mine hits, flags)
//! - Score-ordered listing for display
//!
//! Counters never go below zero. Deltas naming a player the roster does not
//! know about are dropped, since they usually trail an unregister.

use log::debug;
use shared::{DeltaKind, Player, PlayerId, RosterDelta};
use std::collections::HashMap;

/// All known players keyed by their server-assigned id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterReplica {
    players: HashMap<PlayerId, Player>,
}

impl RosterReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire roster with the players from a board snapshot
    ///
    /// Later duplicates of the same id win, matching insert semantics.
    pub fn replace_all(&mut self, players: Vec<Player>) {
        self.players = players
            .into_iter()
            .map(|player| (player.id.clone(), player))
            .collect();
    }

    /// Inserts a player, overwriting any existing record with the same id
    pub fn register(&mut self, player: Player) {
        debug!("Player {} registered as {:?}", player.id, player.display_name);
        self.players.insert(player.id.clone(), player);
    }

    /// Removes a player
    ///
    /// Returns true if the player was present. Unknown ids are not an error.
    pub fn unregister(&mut self, id: &str) -> bool {
        let removed = self.players.remove(id).is_some();
        if removed {
            debug!("Player {} unregistered", id);
        }
        removed
    }

    /// Applies scoreboard deltas in order
    ///
    /// Each delta is a read-modify-write on a single player. Returns how many
    /// deltas found their target.
    pub fn apply_deltas(&mut self, deltas: &[RosterDelta]) -> usize {
        let mut applied = 0;

        for delta in deltas {
            let Some(player) = self.players.get_mut(&delta.player) else {
                debug!("Skipping {:?} for unknown player {}", delta.kind, delta.player);
                continue;
            };

            match delta.kind {
                DeltaKind::ScoreAdjust(amount) => {
                    player.score = player.score.saturating_add_signed(amount);
                }
                DeltaKind::MineHit => {
                    player.total_mine_hits = player.total_mine_hits.saturating_add(1);
                }
                DeltaKind::FlagPlaced => {
                    player.active_flag_count = player.active_flag_count.saturating_add(1);
                }
                DeltaKind::FlagRemoved => {
                    player.active_flag_count = player.active_flag_count.saturating_sub(1);
                }
            }
            applied += 1;
        }

        applied
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    /// Players ordered for display: highest score first, then by name and id
    pub fn ranked(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
