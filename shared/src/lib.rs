//! Wire-level data model shared between the game client and anything that
//! speaks its protocol.
//!
//! Everything here is pure data: cells, players, the game phase, the action
//! frames a client sends, and the [`decode`] module that turns raw server
//! frames into typed events. No I/O happens in this crate.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod decode;

pub use decode::{
    decode_frame, BoardSnapshot, CellBatch, CellPatch, CellUpdate, DecodeError, DeltaKind,
    RosterDelta, ServerEvent,
};

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8081/ws";
pub const RECONNECT_DELAY_MS: u64 = 3000;

/// Stable player key assigned by the server.
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagState {
    #[default]
    Clear,
    Placed,
}

impl FlagState {
    /// Maps the numeric wire value; anything outside the known range is `None`.
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(FlagState::Clear),
            1 => Some(FlagState::Placed),
            _ => None,
        }
    }
}

/// One grid position as the client knows it.
///
/// `adjacent_mines` only carries meaning for revealed, non-mine cells; hidden
/// cells arrive from the server with the count zeroed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub revealed: bool,
    pub mine: bool,
    pub adjacent_mines: u32,
    pub flag: FlagState,
    pub flag_owner: Option<PlayerId>,
}

impl Cell {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn is_flagged(&self) -> bool {
        self.flag == FlagState::Placed
    }

    /// True when the adjacency count should be shown.
    pub fn shows_count(&self) -> bool {
        self.revealed && !self.mine && self.adjacent_mines > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    InProgress,
    Ended,
}

impl GamePhase {
    /// Accepts both spellings the server uses: `"in_progress"`/`"ended"` and
    /// the numeric `0`/`1`. Returns `None` for anything else.
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.trim() {
                "in_progress" => Some(GamePhase::InProgress),
                "ended" => Some(GamePhase::Ended),
                _ => None,
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(GamePhase::InProgress),
                Some(1) => Some(GamePhase::Ended),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_in_progress(self) -> bool {
        self == GamePhase::InProgress
    }
}

/// A participant on the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "playerID")]
    pub id: PlayerId,
    #[serde(rename = "playerName", default)]
    pub display_name: String,
    #[serde(default, deserialize_with = "non_negative")]
    pub score: u64,
    #[serde(rename = "totalDefuses", default, deserialize_with = "non_negative")]
    pub total_defuses: u64,
    #[serde(rename = "totalMineHits", default, deserialize_with = "non_negative")]
    pub total_mine_hits: u64,
    #[serde(rename = "activeFlagCount", default, deserialize_with = "non_negative")]
    pub active_flag_count: u64,
    #[serde(rename = "isLoggedIn", default)]
    pub authenticated: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            score: 0,
            total_defuses: 0,
            total_mine_hits: 0,
            active_flag_count: 0,
            authenticated: false,
        }
    }
}

fn non_negative<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value.max(0) as u64)
}

/// Round parameters broadcast with every board snapshot. All fields are
/// optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConstants {
    /// Unix seconds.
    pub game_start_time: Option<i64>,
    pub game_board_size: Option<u32>,
    pub mines_multiplier: Option<f32>,
    pub reveal_reward: Option<i64>,
    pub flag_validate_reward: Option<i64>,
    pub flag_bad_penalty: Option<i64>,
    pub mine_hit_penalty: Option<i64>,
    pub active_flag_limit: Option<i64>,
}

/// Intents the client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ClientAction {
    Reveal { x: u32, y: u32 },
    Flag { x: u32, y: u32 },
}

impl ClientAction {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn coords(&self) -> (u32, u32) {
        match *self {
            ClientAction::Reveal { x, y } | ClientAction::Flag { x, y } => (x, y),
        }
    }
}
