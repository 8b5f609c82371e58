//! Core engine data types shared by the board, the evaluator and the wire.

use std::fmt;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Seat identity inside one match: `0..N-1`, also the turn order.
pub type PlayerId = u8;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// Smallest and largest number of dots per side.
pub const MIN_DOTS: usize = 2;
pub const MAX_DOTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    #[serde(rename = "h")]
    Horizontal,
    #[serde(rename = "v")]
    Vertical,
}

/// One edge between two adjacent dots.
///
/// A horizontal edge at `(row, col)` joins dot `(row, col)` to `(row, col + 1)`;
/// a vertical edge joins dot `(row, col)` to `(row + 1, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub kind: LineKind,
    pub row: usize,
    pub col: usize,
}

impl Move {
    pub fn horizontal(row: usize, col: usize) -> Self {
        Self { kind: LineKind::Horizontal, row, col }
    }

    pub fn vertical(row: usize, col: usize) -> Self {
        Self { kind: LineKind::Vertical, row, col }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = match self.kind {
            LineKind::Horizontal => 'h',
            LineKind::Vertical => 'v',
        };
        write!(f, "{}{},{}", k, self.row, self.col)
    }
}

/// Top-left dot of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxCoord {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub identity: PlayerId,
    pub name: String,
    pub icon: String,
    /// Hex color, e.g. `#3498db`.
    pub color: String,
    #[serde(default)]
    pub score: u32,
    /// Set for CPU seats; networked matches only carry humans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Difficulty>,
}

impl PlayerRecord {
    pub fn human(identity: PlayerId, name: &str, icon: &str, color: &str) -> Self {
        Self {
            identity,
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            score: 0,
            cpu: None,
        }
    }

    pub fn cpu(identity: PlayerId, name: &str, icon: &str, color: &str, tier: Difficulty) -> Self {
        Self {
            cpu: Some(tier),
            ..Self::human(identity, name, icon, color)
        }
    }

    pub fn is_cpu(&self) -> bool {
        self.cpu.is_some()
    }
}

/// Final standings. More than one winner means a shared win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winners: Vec<PlayerId>,
    pub final_scores: Vec<u32>,
}

impl GameResult {
    pub fn is_shared(&self) -> bool {
        self.winners.len() > 1
    }
}

/// Presentation intents emitted by the turn state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EdgeDrawn { mv: Move, by: PlayerId },
    BoxClaimed { at: BoxCoord, by: PlayerId },
    TurnChanged { to: PlayerId },
    GameOver(GameResult),
}

/// What a single accepted move did to the board.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    pub events: Vec<Event>,
    pub scored: u32,
    pub next_player: PlayerId,
    pub game_over: Option<GameResult>,
}

/// Why `apply_move` refused to touch the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveRejection {
    #[display("match is not active")]
    Inactive,
    #[display("edge {mv} is off the board")]
    OutOfBounds { mv: Move },
    #[display("edge {mv} is already drawn")]
    AlreadyDrawn { mv: Move },
    #[display("player {mover} moved out of turn (waiting on player {current})")]
    NotYourTurn { mover: PlayerId, current: PlayerId },
}
