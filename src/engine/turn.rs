//! Turn state machine: the one place a move changes the board.
//!
//! Local clicks, CPU decisions and remote echoes all enter through
//! [`TurnMachine::apply_move`].

use crate::engine::board::BoardState;
use crate::engine::evaluator::boxes_completed_by;
use crate::engine::models::*;

/// Externally visible state of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingMove(PlayerId),
    GameOver(GameResult),
}

/// Whether moves can arrive from a peer. Undo is local-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Local,
    Networked,
}

/// Enough to reverse the latest non-scoring move.
#[derive(Debug, Clone)]
struct UndoRecord {
    mv: Move,
    mover: PlayerId,
    prior_score: u32,
    touched: Vec<(BoxCoord, Option<PlayerId>)>,
}

pub struct TurnMachine {
    board: BoardState,
    mode: MatchMode,
    undo: Option<UndoRecord>,
}

impl TurnMachine {
    pub fn new(board: BoardState, mode: MatchMode) -> Self {
        Self { board, mode, undo: None }
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn into_board(self) -> BoardState {
        self.board
    }

    pub fn phase(&self) -> TurnPhase {
        if !self.board.active && self.is_complete() {
            TurnPhase::GameOver(self.board.result())
        } else {
            TurnPhase::AwaitingMove(self.board.current_player)
        }
    }

    fn is_complete(&self) -> bool {
        self.board.total_boxes > 0 && self.board.filled_box_count >= self.board.total_boxes
    }

    /// Whether `player` may draw `mv` right now.
    pub fn is_edge_enabled(&self, mv: &Move, player: PlayerId) -> bool {
        self.board.active
            && self.board.current_player == player
            && self.board.in_bounds(mv)
            && !self.board.is_drawn(mv)
    }

    /// Apply one move for `mover`.
    ///
    /// A remote echo is authoritative about who moved; a local move must come
    /// from the current player. Rejections leave the board untouched, which
    /// makes replaying the same edge harmless.
    pub fn apply_move(
        &mut self,
        mv: Move,
        mover: PlayerId,
        is_remote_echo: bool,
    ) -> Result<TransitionResult, MoveRejection> {
        let current = self.board.current_player;
        if !self.board.active {
            tracing::debug!(%mv, mover, "move ignored: match inactive");
            return Err(MoveRejection::Inactive);
        }
        if !self.board.in_bounds(&mv) || (mover as usize) >= self.board.players.len() {
            tracing::warn!(%mv, mover, "move ignored: off the board");
            return Err(MoveRejection::OutOfBounds { mv });
        }
        if self.board.is_drawn(&mv) {
            tracing::debug!(%mv, mover, "move ignored: edge already drawn");
            return Err(MoveRejection::AlreadyDrawn { mv });
        }
        let echo = is_remote_echo && self.mode == MatchMode::Networked;
        if mover != current && !echo {
            return Err(MoveRejection::NotYourTurn { mover, current });
        }

        // Decide what closes against the pre-move board with `mv` overlaid.
        let closed = boxes_completed_by(&self.board, &mv);

        let board = &mut self.board;
        if mover != current {
            tracing::debug!(mover, current, "remote mover overrides current player");
            board.current_player = mover;
        }
        let prior_score = board.players[mover as usize].score;
        let mut touched = Vec::with_capacity(2);
        let mut events = vec![Event::EdgeDrawn { mv, by: mover }];
        let mut scored = 0u32;

        board.set_drawn(&mv, true);
        for b in closed {
            touched.push((b, board.box_owner[b.row][b.col]));
            board.box_owner[b.row][b.col] = Some(mover);
            scored += 1;
            events.push(Event::BoxClaimed { at: b, by: mover });
        }

        if scored > 0 {
            board.players[mover as usize].score += scored;
            board.filled_box_count += scored as usize;
            board.current_player = mover;
        }

        let game_over = if board.total_boxes > 0 && board.filled_box_count >= board.total_boxes {
            board.active = false;
            let result = board.result();
            tracing::info!(winners = ?result.winners, scores = ?result.final_scores, "game over");
            events.push(Event::GameOver(result.clone()));
            Some(result)
        } else {
            if scored == 0 {
                board.current_player = ((mover as usize + 1) % board.players.len()) as PlayerId;
            }
            events.push(Event::TurnChanged { to: board.current_player });
            None
        };

        self.undo = if scored == 0 && self.mode == MatchMode::Local {
            Some(UndoRecord { mv, mover, prior_score, touched })
        } else {
            None
        };

        tracing::debug!(%mv, mover, scored, next = self.board.current_player, "move applied");
        Ok(TransitionResult {
            events,
            scored,
            next_player: self.board.current_player,
            game_over,
        })
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    /// Reverse the latest non-scoring local move. `None` when there is nothing
    /// to undo; a second call without a new move in between is a no-op.
    pub fn undo(&mut self) -> Option<Vec<Event>> {
        let record = self.undo.take()?;
        let board = &mut self.board;
        board.set_drawn(&record.mv, false);
        for (b, prior) in &record.touched {
            if board.box_owner[b.row][b.col].is_some() && prior.is_none() {
                board.filled_box_count -= 1;
            }
            board.box_owner[b.row][b.col] = *prior;
        }
        board.players[record.mover as usize].score = record.prior_score;
        board.current_player = record.mover;
        tracing::debug!(mv = %record.mv, mover = record.mover, "move undone");
        Some(vec![Event::TurnChanged { to: record.mover }])
    }

    /// Adopt a board wholesale (full-state sync or handshake completion).
    pub fn replace_board(&mut self, board: BoardState) {
        self.board = board;
        self.undo = None;
    }

    /// Sequence number for a move this side just applied and is about to send.
    pub fn advance_sequence(&mut self) -> u64 {
        self.board.turn_sequence += 1;
        self.board.turn_sequence
    }

    /// Catch up with a sequence number seen from the peer.
    pub fn observe_sequence(&mut self, seq: u64) {
        self.board.turn_sequence = self.board.turn_sequence.max(seq);
    }

    /// End the match without a result, e.g. when the peer is gone.
    pub fn halt(&mut self) {
        self.board.active = false;
        self.undo = None;
    }

    #[cfg(test)]
    pub(crate) fn board_mut(&mut self) -> &mut BoardState {
        &mut self.board
    }
}
