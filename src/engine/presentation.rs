//! Presentation trait: the hooks a front end implements.
//!
//! The core never reads layout state; it pushes intents through these hooks
//! and front ends query the board for anything else.

use crate::engine::board::BoardState;
use crate::engine::models::*;

pub trait Presentation {
    fn draw_edge(&mut self, mv: Move, by: PlayerId);
    fn mark_box(&mut self, at: BoxCoord, by: PlayerId);
    fn turn_changed(&mut self, to: PlayerId);
    fn announce_winners(&mut self, result: &GameResult);
    /// Transient notice (rejected input, peer messages, errors).
    fn show_message(&mut self, text: &str);
    /// Enable or disable local move input.
    fn set_input_enabled(&mut self, enabled: bool);
    /// Throw away whatever is drawn and redraw from `board`.
    fn redraw(&mut self, board: &BoardState);
}

/// Forward engine events to a presentation, in order.
pub fn dispatch(events: &[Event], ui: &mut dyn Presentation) {
    for event in events {
        match event {
            Event::EdgeDrawn { mv, by } => ui.draw_edge(*mv, *by),
            Event::BoxClaimed { at, by } => ui.mark_box(*at, *by),
            Event::TurnChanged { to } => ui.turn_changed(*to),
            Event::GameOver(result) => ui.announce_winners(result),
        }
    }
}

/// Records every hook call; for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingPresentation {
    pub calls: Vec<String>,
    pub input_enabled: bool,
    pub redraws: usize,
}

impl Presentation for RecordingPresentation {
    fn draw_edge(&mut self, mv: Move, by: PlayerId) {
        self.calls.push(format!("edge {mv} by {by}"));
    }

    fn mark_box(&mut self, at: BoxCoord, by: PlayerId) {
        self.calls.push(format!("box {},{} by {by}", at.row, at.col));
    }

    fn turn_changed(&mut self, to: PlayerId) {
        self.calls.push(format!("turn {to}"));
    }

    fn announce_winners(&mut self, result: &GameResult) {
        self.calls.push(format!("winners {:?}", result.winners));
    }

    fn show_message(&mut self, text: &str) {
        self.calls.push(format!("message {text}"));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn redraw(&mut self, _board: &BoardState) {
        self.redraws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_preserves_order() {
        let events = vec![
            Event::EdgeDrawn { mv: Move::vertical(0, 1), by: 1 },
            Event::BoxClaimed { at: BoxCoord { row: 0, col: 0 }, by: 1 },
            Event::TurnChanged { to: 1 },
        ];
        let mut ui = RecordingPresentation::default();
        dispatch(&events, &mut ui);
        assert_eq!(ui.calls, vec!["edge v0,1 by 1", "box 0,0 by 1", "turn 1"]);
    }
}
