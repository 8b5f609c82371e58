//! Board state for one match: edge occupancy, box owners, scores and turn.
//!
//! Mutation happens only through `engine::turn`; everything here either
//! builds a fresh board or reads it.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::engine::models::*;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    #[display("grid must be 2 to 16 dots per side, got {rows}x{cols}")]
    Dimensions { rows: usize, cols: usize },
    #[display("need 2 to 4 players, got {count}")]
    PlayerCount { count: usize },
    #[display("player at seat {seat} has identity {identity}")]
    Identity { seat: usize, identity: PlayerId },
    #[display("inconsistent board: {reason}")]
    Inconsistent { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    /// `rows x (cols - 1)`
    pub(crate) horizontal_edges: Vec<Vec<bool>>,
    /// `(rows - 1) x cols`
    pub(crate) vertical_edges: Vec<Vec<bool>>,
    /// `(rows - 1) x (cols - 1)`; `None` is unclaimed.
    pub(crate) box_owner: Vec<Vec<Option<PlayerId>>>,
    pub(crate) filled_box_count: usize,
    pub(crate) total_boxes: usize,
    pub(crate) players: Vec<PlayerRecord>,
    pub(crate) current_player: PlayerId,
    pub(crate) active: bool,
    pub(crate) turn_sequence: u64,
}

impl BoardState {
    /// Fresh, active board with player 0 to move.
    pub fn new(rows: usize, cols: usize, players: Vec<PlayerRecord>) -> Result<Self, BoardError> {
        check_dimensions(rows, cols)?;
        check_players(&players)?;
        let mut players = players;
        for p in &mut players {
            p.score = 0;
        }
        Ok(Self {
            rows,
            cols,
            horizontal_edges: vec![vec![false; cols - 1]; rows],
            vertical_edges: vec![vec![false; cols]; rows - 1],
            box_owner: vec![vec![None; cols - 1]; rows - 1],
            filled_box_count: 0,
            total_boxes: (rows - 1) * (cols - 1),
            players,
            current_player: 0,
            active: true,
            turn_sequence: 0,
        })
    }

    /// Board awaiting a handshake to finish; no moves are accepted until activated.
    pub fn pending(rows: usize, cols: usize, players: Vec<PlayerRecord>) -> Result<Self, BoardError> {
        let mut board = Self::new(rows, cols, players)?;
        board.active = false;
        Ok(board)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(id as usize)
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn turn_sequence(&self) -> u64 {
        self.turn_sequence
    }

    pub fn filled_box_count(&self) -> usize {
        self.filled_box_count
    }

    pub fn total_boxes(&self) -> usize {
        self.total_boxes
    }

    pub fn horizontal_edges(&self) -> &[Vec<bool>] {
        &self.horizontal_edges
    }

    pub fn vertical_edges(&self) -> &[Vec<bool>] {
        &self.vertical_edges
    }

    pub fn box_owners(&self) -> &[Vec<Option<PlayerId>>] {
        &self.box_owner
    }

    pub fn box_owner(&self, at: BoxCoord) -> Option<PlayerId> {
        self.box_owner[at.row][at.col]
    }

    pub fn scores(&self) -> Vec<u32> {
        self.players.iter().map(|p| p.score).collect()
    }

    pub fn in_bounds(&self, mv: &Move) -> bool {
        match mv.kind {
            // Coordinates can come straight off the wire: compare without adding.
            LineKind::Horizontal => mv.row < self.rows && mv.col < self.cols.saturating_sub(1),
            LineKind::Vertical => mv.row < self.rows.saturating_sub(1) && mv.col < self.cols,
        }
    }

    /// Whether the edge is drawn. Out-of-bounds edges read as undrawn.
    pub fn is_drawn(&self, mv: &Move) -> bool {
        if !self.in_bounds(mv) {
            return false;
        }
        match mv.kind {
            LineKind::Horizontal => self.horizontal_edges[mv.row][mv.col],
            LineKind::Vertical => self.vertical_edges[mv.row][mv.col],
        }
    }

    pub(crate) fn set_drawn(&mut self, mv: &Move, drawn: bool) {
        match mv.kind {
            LineKind::Horizontal => self.horizontal_edges[mv.row][mv.col] = drawn,
            LineKind::Vertical => self.vertical_edges[mv.row][mv.col] = drawn,
        }
    }

    /// Count claimed boxes by scanning `box_owner`.
    pub fn count_claimed(&self) -> usize {
        self.box_owner
            .iter()
            .flatten()
            .filter(|o| o.is_some())
            .count()
    }

    /// Players holding the top score. Empty only if there are no players.
    pub fn leaders(&self) -> Vec<PlayerId> {
        let best = match self.players.iter().map(|p| p.score).max() {
            Some(b) => b,
            None => return vec![],
        };
        self.players
            .iter()
            .filter(|p| p.score == best)
            .map(|p| p.identity)
            .collect()
    }

    pub fn result(&self) -> GameResult {
        GameResult {
            winners: self.leaders(),
            final_scores: self.scores(),
        }
    }

    /// Full structural check: grid shapes, identities, cached counters and
    /// the drawn-edges/owner equivalence. Used on boards that arrive over
    /// the wire and in tests.
    pub fn validate(&self) -> Result<(), BoardError> {
        check_dimensions(self.rows, self.cols)?;
        check_players(&self.players)?;
        let inconsistent = |reason: String| Err(BoardError::Inconsistent { reason });

        let shape_ok = |grid_rows: usize, grid_cols: usize, lens: Vec<usize>| {
            lens.len() == grid_rows && lens.iter().all(|&l| l == grid_cols)
        };
        if !shape_ok(self.rows, self.cols - 1, self.horizontal_edges.iter().map(Vec::len).collect())
            || !shape_ok(self.rows - 1, self.cols, self.vertical_edges.iter().map(Vec::len).collect())
            || !shape_ok(self.rows - 1, self.cols - 1, self.box_owner.iter().map(Vec::len).collect())
        {
            return inconsistent("grid shape does not match dimensions".into());
        }
        if self.total_boxes != (self.rows - 1) * (self.cols - 1) {
            return inconsistent(format!("total_boxes is {}", self.total_boxes));
        }
        if (self.current_player as usize) >= self.players.len() {
            return inconsistent(format!("current player {} has no seat", self.current_player));
        }
        let claimed = self.count_claimed();
        if claimed != self.filled_box_count {
            return inconsistent(format!(
                "filled_box_count {} but {} boxes claimed",
                self.filled_box_count, claimed
            ));
        }

        let mut per_player = vec![0u32; self.players.len()];
        for r in 0..self.rows - 1 {
            for c in 0..self.cols - 1 {
                let closed = self.horizontal_edges[r][c]
                    && self.horizontal_edges[r + 1][c]
                    && self.vertical_edges[r][c]
                    && self.vertical_edges[r][c + 1];
                match self.box_owner[r][c] {
                    Some(owner) if (owner as usize) >= self.players.len() => {
                        return inconsistent(format!("box {r},{c} owned by unknown player {owner}"));
                    }
                    Some(owner) if closed => per_player[owner as usize] += 1,
                    None if !closed => {}
                    _ => return inconsistent(format!("box {r},{c} ownership disagrees with its edges")),
                }
            }
        }
        for p in &self.players {
            if p.score != per_player[p.identity as usize] {
                return inconsistent(format!(
                    "player {} scores {} but owns {} boxes",
                    p.identity, p.score, per_player[p.identity as usize]
                ));
            }
        }
        Ok(())
    }
}

fn check_dimensions(rows: usize, cols: usize) -> Result<(), BoardError> {
    let ok = |n: usize| (MIN_DOTS..=MAX_DOTS).contains(&n);
    if ok(rows) && ok(cols) {
        Ok(())
    } else {
        Err(BoardError::Dimensions { rows, cols })
    }
}

fn check_players(players: &[PlayerRecord]) -> Result<(), BoardError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) {
        return Err(BoardError::PlayerCount { count: players.len() });
    }
    for (seat, p) in players.iter().enumerate() {
        if p.identity as usize != seat {
            return Err(BoardError::Identity { seat, identity: p.identity });
        }
    }
    Ok(())
}
