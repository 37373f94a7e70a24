//! Decoding of server frames into typed events.
//!
//! Every frame is a JSON object `{"type": ..., "payload": ...}`. The envelope
//! is parsed first, the `type` tag is trimmed and matched, and only then is the
//! payload shaped into the event-specific form. Unknown tags decode to
//! [`ServerEvent::Unrecognized`] instead of failing, so the caller can skip
//! them without treating them as errors.

use crate::{Cell, FlagState, GameConstants, GamePhase, Player, PlayerId};
use log::debug;
use ndarray::{Array2, ShapeError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const GAMEBOARD_STATE: &str = "GAMEBOARD_STATE";
pub const GAME_STATUS: &str = "GAME_STATUS";
pub const CELL: &str = "CELL";
pub const REGISTER: &str = "REGISTER";
pub const UNREGISTER: &str = "UNREGISTER";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} payload is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("board column {column} has {found} cells, expected {expected}")]
    RaggedBoard {
        column: usize,
        found: usize,
        expected: usize,
    },
    #[error("board shape rejected: {0}")]
    Shape(#[from] ShapeError),
}

/// A decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    BoardSnapshot(BoardSnapshot),
    /// `None` when the status value was not one of the known phases.
    GameStatus(Option<GamePhase>),
    CellPatch(CellBatch),
    Register(Player),
    Unregister(PlayerId),
    Unrecognized(String),
}

impl ServerEvent {
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::BoardSnapshot(_) => GAMEBOARD_STATE,
            ServerEvent::GameStatus(_) => GAME_STATUS,
            ServerEvent::CellPatch(_) => CELL,
            ServerEvent::Register(_) => REGISTER,
            ServerEvent::Unregister(_) => UNREGISTER,
            ServerEvent::Unrecognized(kind) => kind,
        }
    }
}

/// Full board state, indexed `cells[(x, y)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub cells: Array2<Cell>,
    pub cells_remaining: u64,
    pub constants: GameConstants,
    pub phase: Option<GamePhase>,
    /// Unix seconds at which an ended round restarts.
    pub restart_time: Option<i64>,
    pub players: Option<Vec<Player>>,
}

/// The body of a `CELL` event: cell changes followed by scoreboard deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellBatch {
    pub cells: Vec<CellPatch>,
    pub deltas: Vec<RosterDelta>,
}

/// One cell change. Coordinates are signed so stale or bogus values survive
/// decoding and are rejected by the bounds check instead.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub x: i64,
    pub y: i64,
    pub update: CellUpdate,
}

/// Incoming per-cell values. `flag` is `None` when the wire carried a flag
/// state the client does not know, in which case the existing flag fields are
/// left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellUpdate {
    pub revealed: bool,
    pub mine: bool,
    pub adjacent_mines: u32,
    pub flag: Option<FlagState>,
    pub flag_owner: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterDelta {
    pub player: PlayerId,
    pub kind: DeltaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    ScoreAdjust(i64),
    MineHit,
    FlagPlaced,
    FlagRemoved,
}

impl DeltaKind {
    pub fn from_wire(kind: &str, value: i64) -> Option<Self> {
        match kind.trim() {
            "SCORE" => Some(DeltaKind::ScoreAdjust(value)),
            "MINE_HIT_INCREMENT" => Some(DeltaKind::MineHit),
            "FLAG_INCREMENT" => Some(DeltaKind::FlagPlaced),
            "FLAG_DECREMENT" => Some(DeltaKind::FlagRemoved),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCell {
    #[serde(rename = "isRevealed", alias = "IsRevealed")]
    is_revealed: bool,
    #[serde(rename = "isMine", alias = "IsMine")]
    is_mine: bool,
    #[serde(rename = "adjacentMines", alias = "AdjacentMines")]
    adjacent_mines: u32,
    #[serde(rename = "flagState", alias = "FlagState")]
    flag_state: i64,
    #[serde(rename = "flagOwnerID", alias = "FlagOwnerID")]
    flag_owner_id: Option<String>,
}

impl WireCell {
    fn owner(&mut self) -> Option<PlayerId> {
        self.flag_owner_id.take().filter(|id| !id.trim().is_empty())
    }

    fn into_update(mut self) -> CellUpdate {
        CellUpdate {
            revealed: self.is_revealed,
            mine: self.is_mine,
            adjacent_mines: self.adjacent_mines,
            flag: FlagState::from_wire(self.flag_state),
            flag_owner: self.owner(),
        }
    }

    fn into_cell(mut self) -> Cell {
        let flag = FlagState::from_wire(self.flag_state).unwrap_or_default();
        let owner = self.owner();
        Cell {
            revealed: self.is_revealed,
            mine: self.is_mine,
            adjacent_mines: self.adjacent_mines,
            flag,
            flag_owner: owner.filter(|_| flag == FlagState::Placed),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBoard {
    #[serde(default)]
    cells: Option<Vec<Vec<WireCell>>>,
    #[serde(default)]
    cells_to_reveal: i64,
    #[serde(default)]
    game_constants: Option<GameConstants>,
    #[serde(default)]
    game_status: Option<Value>,
    #[serde(default)]
    restart_time: Option<i64>,
    #[serde(default)]
    players: Option<Vec<Player>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCellBatch {
    #[serde(default)]
    cell_updates: Option<Vec<WireCellUpdate>>,
    #[serde(default)]
    scoreboard_updates: Option<Vec<WireScoreboardUpdate>>,
}

#[derive(Deserialize)]
struct WireCellUpdate {
    x: i64,
    y: i64,
    #[serde(default)]
    cell: WireCell,
}

#[derive(Deserialize)]
struct WireScoreboardUpdate {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: i64,
    #[serde(rename = "playerID", default)]
    player_id: String,
    #[serde(default)]
    player: Option<Player>,
}

/// Decodes one raw text frame.
pub fn decode_frame(frame: &str) -> Result<ServerEvent, DecodeError> {
    let envelope: Envelope = serde_json::from_str(frame).map_err(DecodeError::Malformed)?;

    match envelope.kind.trim() {
        GAMEBOARD_STATE => decode_snapshot(envelope.payload).map(ServerEvent::BoardSnapshot),
        GAME_STATUS => Ok(ServerEvent::GameStatus(decode_status(&envelope.payload))),
        CELL => decode_cell_batch(envelope.payload).map(ServerEvent::CellPatch),
        REGISTER => decode_register(&envelope.payload).map(ServerEvent::Register),
        UNREGISTER => decode_unregister(&envelope.payload).map(ServerEvent::Unregister),
        other => Ok(ServerEvent::Unrecognized(other.to_string())),
    }
}

fn payload<T: for<'de> Deserialize<'de>>(
    kind: &'static str,
    value: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Payload { kind, source })
}

fn decode_snapshot(value: Value) -> Result<BoardSnapshot, DecodeError> {
    let board: WireBoard = payload(GAMEBOARD_STATE, value)?;
    let columns = board.cells.unwrap_or_default();

    let width = columns.len();
    let height = columns.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(width * height);
    for (column, cells) in columns.into_iter().enumerate() {
        if cells.len() != height {
            return Err(DecodeError::RaggedBoard {
                column,
                found: cells.len(),
                expected: height,
            });
        }
        flat.extend(cells.into_iter().map(WireCell::into_cell));
    }

    Ok(BoardSnapshot {
        cells: Array2::from_shape_vec((width, height), flat)?,
        cells_remaining: board.cells_to_reveal.max(0) as u64,
        constants: board.game_constants.unwrap_or_default(),
        phase: board.game_status.as_ref().and_then(GamePhase::from_wire),
        restart_time: board.restart_time.filter(|t| *t > 0),
        players: board.players,
    })
}

fn decode_status(value: &Value) -> Option<GamePhase> {
    match value {
        Value::Object(fields) => fields
            .get("status")
            .or_else(|| fields.get("gameStatus"))
            .and_then(GamePhase::from_wire),
        scalar => GamePhase::from_wire(scalar),
    }
}

fn decode_cell_batch(value: Value) -> Result<CellBatch, DecodeError> {
    let batch: WireCellBatch = payload(CELL, value)?;

    let cells = batch
        .cell_updates
        .unwrap_or_default()
        .into_iter()
        .map(|update| CellPatch {
            x: update.x,
            y: update.y,
            update: update.cell.into_update(),
        })
        .collect();

    let deltas = batch
        .scoreboard_updates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|update| {
            let Some(kind) = DeltaKind::from_wire(&update.kind, update.value) else {
                debug!("Dropping scoreboard update of unknown type {:?}", update.kind);
                return None;
            };
            let player = if update.player_id.is_empty() {
                update.player.map(|p| p.id)?
            } else {
                update.player_id
            };
            Some(RosterDelta { player, kind })
        })
        .collect();

    Ok(CellBatch { cells, deltas })
}

/// REGISTER and UNREGISTER wrap the record in `scoreboardUpdates`; older
/// servers send it bare.
fn roster_record(value: &Value) -> &Value {
    value
        .get("scoreboardUpdates")
        .filter(|record| record.is_object())
        .unwrap_or(value)
}

fn decode_register(value: &Value) -> Result<Player, DecodeError> {
    let player = roster_record(value)
        .get("player")
        .cloned()
        .ok_or(DecodeError::MissingField {
            kind: REGISTER,
            field: "player",
        })?;
    payload(REGISTER, player)
}

fn decode_unregister(value: &Value) -> Result<PlayerId, DecodeError> {
    let record = roster_record(value);
    record
        .get("player")
        .and_then(|player| player.get("playerID"))
        .or_else(|| record.get("playerID"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(DecodeError::MissingField {
            kind: UNREGISTER,
            field: "playerID",
        })
}
