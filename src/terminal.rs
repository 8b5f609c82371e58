//! Plain-text front end: renders the board to any writer and parses typed
//! commands.

use std::io::Write;

use crate::engine::board::BoardState;
use crate::engine::models::*;
use crate::engine::presentation::Presentation;

/// Everything the terminal needs to draw, kept in step by the hooks.
#[derive(Debug, Clone)]
struct View {
    rows: usize,
    cols: usize,
    horizontal: Vec<Vec<bool>>,
    vertical: Vec<Vec<bool>>,
    owners: Vec<Vec<Option<PlayerId>>>,
    players: Vec<(String, String)>,
    scores: Vec<u32>,
    current: PlayerId,
}

impl View {
    fn of(board: &BoardState) -> Self {
        Self {
            rows: board.rows(),
            cols: board.cols(),
            horizontal: board.horizontal_edges().to_vec(),
            vertical: board.vertical_edges().to_vec(),
            owners: board.box_owners().to_vec(),
            players: board.players().iter().map(|p| (p.name.clone(), p.icon.clone())).collect(),
            scores: board.scores(),
            current: board.current_player(),
        }
    }

    fn icon(&self, id: PlayerId) -> &str {
        self.players.get(id as usize).map_or("?", |(_, icon)| icon.as_str())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let standings: Vec<String> = self
            .players
            .iter()
            .zip(&self.scores)
            .enumerate()
            .map(|(i, ((name, icon), score))| {
                let marker = if i == self.current as usize { ">" } else { " " };
                format!("{marker}{icon} {name}: {score}")
            })
            .collect();
        out.push_str(&standings.join("   "));
        out.push('\n');

        out.push_str("   ");
        for c in 0..self.cols {
            out.push_str(&format!("{c:<4}"));
        }
        out.push('\n');
        for r in 0..self.rows {
            out.push_str(&format!("{r:>2} "));
            for c in 0..self.cols {
                out.push('o');
                if c + 1 < self.cols {
                    out.push_str(if self.horizontal[r][c] { "---" } else { "   " });
                }
            }
            out.push('\n');
            if r + 1 < self.rows {
                out.push_str("   ");
                for c in 0..self.cols {
                    out.push(if self.vertical[r][c] { '|' } else { ' ' });
                    if c + 1 < self.cols {
                        match self.owners[r][c] {
                            Some(id) => out.push_str(&format!(" {} ", self.icon(id))),
                            None => out.push_str("   "),
                        }
                    }
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Render a board as text.
pub fn render_board(board: &BoardState) -> String {
    View::of(board).render()
}

/// Presentation that writes to a terminal (or any writer in tests).
pub struct TerminalPresentation<W: Write> {
    out: W,
    view: Option<View>,
    input_enabled: bool,
}

impl<W: Write> TerminalPresentation<W> {
    pub fn new(out: W) -> Self {
        Self { out, view: None, input_enabled: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        // A closed terminal is not worth failing a match over.
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    fn show_board(&mut self) {
        let Some(text) = self.view.as_ref().map(View::render) else {
            return;
        };
        self.emit(&text);
        if self.input_enabled {
            self.emit("move> ");
        }
    }
}

impl<W: Write> Presentation for TerminalPresentation<W> {
    fn draw_edge(&mut self, mv: Move, _by: PlayerId) {
        if let Some(view) = self.view.as_mut() {
            let grid = match mv.kind {
                LineKind::Horizontal => &mut view.horizontal,
                LineKind::Vertical => &mut view.vertical,
            };
            if let Some(cell) = grid.get_mut(mv.row).and_then(|row| row.get_mut(mv.col)) {
                *cell = true;
            }
        }
    }

    fn mark_box(&mut self, at: BoxCoord, by: PlayerId) {
        if let Some(view) = self.view.as_mut() {
            if let Some(cell) = view.owners.get_mut(at.row).and_then(|row| row.get_mut(at.col)) {
                *cell = Some(by);
            }
            if let Some(score) = view.scores.get_mut(by as usize) {
                *score += 1;
            }
        }
    }

    fn turn_changed(&mut self, to: PlayerId) {
        if let Some(view) = self.view.as_mut() {
            view.current = to;
        }
        self.show_board();
    }

    fn announce_winners(&mut self, result: &GameResult) {
        self.show_board();
        let names: Vec<String> = match self.view.as_ref() {
            Some(view) => result
                .winners
                .iter()
                .map(|&id| view.players.get(id as usize).map_or_else(|| format!("player {id}"), |(n, _)| n.clone()))
                .collect(),
            None => result.winners.iter().map(|id| format!("player {id}")).collect(),
        };
        let line = if result.is_shared() {
            format!("Game over: shared win for {}\n", names.join(" and "))
        } else {
            format!("Game over: {} wins\n", names.join(""))
        };
        self.emit(&line);
    }

    fn show_message(&mut self, text: &str) {
        self.emit(&format!("* {text}\n"));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if enabled && !self.input_enabled {
            self.emit("move> ");
        }
        self.input_enabled = enabled;
    }

    fn redraw(&mut self, board: &BoardState) {
        self.view = Some(View::of(board));
        self.show_board();
    }
}

/// A typed line from the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Move(Move),
    Undo,
    Restart,
    Answer(bool),
    Quit,
    Help,
}

pub const HELP: &str = "\
moves:   h ROW COL  (horizontal, e.g. h0,1)   v ROW COL  (vertical)
other:   undo | restart | yes | no | quit | help";

pub fn parse_command(line: &str) -> Result<TerminalCommand, String> {
    let line = line.trim().to_ascii_lowercase();
    match line.as_str() {
        "undo" | "u" => return Ok(TerminalCommand::Undo),
        "restart" | "rematch" => return Ok(TerminalCommand::Restart),
        "yes" | "y" => return Ok(TerminalCommand::Answer(true)),
        "no" | "n" => return Ok(TerminalCommand::Answer(false)),
        "quit" | "q" | "exit" => return Ok(TerminalCommand::Quit),
        "help" | "?" => return Ok(TerminalCommand::Help),
        _ => {}
    }
    let mut chars = line.chars();
    let kind = match chars.next() {
        Some('h') => LineKind::Horizontal,
        Some('v') => LineKind::Vertical,
        _ => return Err(format!("unknown command '{line}' (try 'help')")),
    };
    let coords: Vec<&str> = chars
        .as_str()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    let [row, col] = coords.as_slice() else {
        return Err(format!("expected a row and a column in '{line}'"));
    };
    let row = row.parse().map_err(|_| format!("bad row '{row}'"))?;
    let col = col.parse().map_err(|_| format!("bad column '{col}'"))?;
    Ok(TerminalCommand::Move(Move { kind, row, col }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::board::tests::two_players;
    use crate::engine::presentation::dispatch;
    use crate::engine::turn::{MatchMode, TurnMachine};

    #[test]
    fn parses_moves_in_both_spellings() {
        assert_eq!(parse_command("h0,1"), Ok(TerminalCommand::Move(Move::horizontal(0, 1))));
        assert_eq!(parse_command("  V 2 3 "), Ok(TerminalCommand::Move(Move::vertical(2, 3))));
        assert_eq!(parse_command("v 1, 0"), Ok(TerminalCommand::Move(Move::vertical(1, 0))));
        assert_eq!(parse_command("yes"), Ok(TerminalCommand::Answer(true)));
        assert_eq!(parse_command("Q"), Ok(TerminalCommand::Quit));
        assert!(parse_command("h 1").is_err());
        assert!(parse_command("h x 1").is_err());
        assert!(parse_command("diagonal").is_err());
    }

    #[test]
    fn renders_edges_and_owners() {
        let mut tm = TurnMachine::new(BoardState::new(3, 3, two_players()).unwrap(), MatchMode::Local);
        for mv in [Move::horizontal(0, 0), Move::horizontal(2, 1), Move::vertical(0, 0), Move::horizontal(1, 0)] {
            let p = tm.board().current_player();
            tm.apply_move(mv, p, false).unwrap();
        }
        tm.apply_move(Move::vertical(0, 1), 0, false).unwrap();
        let text = render_board(tm.board());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ">● Ann: 1    ▲ Bob: 0");
        assert_eq!(lines[2], " 0 o---o   o");
        assert_eq!(lines[3], "   | ● |    ");
        assert_eq!(lines[4], " 1 o---o   o");
        assert_eq!(lines[6], " 2 o   o---o");
    }

    #[test]
    fn hooks_keep_the_view_current() {
        let board = BoardState::new(3, 3, two_players()).unwrap();
        let mut tm = TurnMachine::new(board.clone(), MatchMode::Local);
        let mut term = TerminalPresentation::new(Vec::new());
        term.redraw(&board);
        for mv in [Move::horizontal(0, 0), Move::horizontal(1, 0), Move::vertical(0, 0)] {
            let p = tm.board().current_player();
            let r = tm.apply_move(mv, p, false).unwrap();
            dispatch(&r.events, &mut term);
        }
        let p = tm.board().current_player();
        let r = tm.apply_move(Move::vertical(0, 1), p, false).unwrap();
        dispatch(&r.events, &mut term);
        let expected = render_board(tm.board());
        let out = String::from_utf8(term.into_inner()).unwrap();
        assert!(out.ends_with(&expected), "terminal view drifted:\n{out}");
    }

    #[test]
    fn shared_win_names_everyone() {
        let board = BoardState::new(3, 3, two_players()).unwrap();
        let mut term = TerminalPresentation::new(Vec::new());
        term.redraw(&board);
        term.announce_winners(&GameResult { winners: vec![0, 1], final_scores: vec![2, 2] });
        let out = String::from_utf8(term.into_inner()).unwrap();
        assert!(out.contains("shared win for Ann and Bob"));
    }
}
