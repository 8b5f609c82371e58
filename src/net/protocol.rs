//! Peer wire messages.
//!
//! Every message is a JSON object tagged by `"type"` with camelCase fields,
//! e.g. `{"type":"GameMove","move":{"kind":"h","row":0,"col":1},"moverIdentity":0,"turnSequence":3}`.

use serde::{Deserialize, Serialize};

use crate::engine::board::{BoardError, BoardState};
use crate::engine::models::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum PeerMessage {
    /// Host → Joiner: match dimensions and the host's seat.
    InitConfig {
        rows: usize,
        cols: usize,
        num_players: usize,
        host_player: PlayerRecord,
    },
    /// Joiner → Host: the joiner's seat after collision resolution.
    JoinInfo { player: PlayerRecord },
    GameMove {
        #[serde(rename = "move")]
        mv: Move,
        mover_identity: PlayerId,
        turn_sequence: u64,
    },
    /// Host → Joiner: the whole board, adopted wholesale.
    FullState(FullStateSnapshot),
    RestartRequest { requester_name: String },
    RestartAck,
    RestartNak,
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::InitConfig { .. } => "InitConfig",
            PeerMessage::JoinInfo { .. } => "JoinInfo",
            PeerMessage::GameMove { .. } => "GameMove",
            PeerMessage::FullState(_) => "FullState",
            PeerMessage::RestartRequest { .. } => "RestartRequest",
            PeerMessage::RestartAck => "RestartAck",
            PeerMessage::RestartNak => "RestartNak",
        }
    }
}

/// Board state as it travels in a `FullState` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullStateSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub num_players: usize,
    pub players: Vec<PlayerRecord>,
    pub horizontal_edges: Vec<Vec<bool>>,
    pub vertical_edges: Vec<Vec<bool>>,
    /// `null` for unclaimed boxes.
    pub box_owner: Vec<Vec<Option<PlayerId>>>,
    pub filled_box_count: usize,
    pub current_player: PlayerId,
    pub active: bool,
    pub turn_sequence: u64,
}

impl From<&BoardState> for FullStateSnapshot {
    fn from(board: &BoardState) -> Self {
        Self {
            rows: board.rows,
            cols: board.cols,
            num_players: board.players.len(),
            players: board.players.clone(),
            horizontal_edges: board.horizontal_edges.clone(),
            vertical_edges: board.vertical_edges.clone(),
            box_owner: board.box_owner.clone(),
            filled_box_count: board.filled_box_count,
            current_player: board.current_player,
            active: board.active,
            turn_sequence: board.turn_sequence,
        }
    }
}

impl TryFrom<FullStateSnapshot> for BoardState {
    type Error = BoardError;

    /// Remote input is validated before it can index anything.
    fn try_from(snap: FullStateSnapshot) -> Result<Self, Self::Error> {
        if snap.num_players != snap.players.len() {
            return Err(BoardError::Inconsistent {
                reason: format!("numPlayers {} but {} player records", snap.num_players, snap.players.len()),
            });
        }
        let board = BoardState {
            rows: snap.rows,
            cols: snap.cols,
            horizontal_edges: snap.horizontal_edges,
            vertical_edges: snap.vertical_edges,
            box_owner: snap.box_owner,
            filled_box_count: snap.filled_box_count,
            total_boxes: snap.rows.saturating_sub(1) * snap.cols.saturating_sub(1),
            players: snap.players,
            current_player: snap.current_player,
            active: snap.active,
            turn_sequence: snap.turn_sequence,
        };
        board.validate()?;
        Ok(board)
    }
}
