//! Move evaluation: legal, box-completing and safe moves.
//!
//! Everything here reads a `BoardState` and never mutates it. Hypothetical
//! moves are laid over the board through `Overlay` instead of being drawn
//! and reverted, so the turn state machine and the CPU count edges the same
//! way.

use crate::engine::board::BoardState;
use crate::engine::models::*;

/// A board with one extra edge treated as drawn.
#[derive(Clone, Copy)]
pub struct Overlay<'a> {
    board: &'a BoardState,
    extra: Option<Move>,
}

impl<'a> Overlay<'a> {
    pub fn new(board: &'a BoardState) -> Self {
        Self { board, extra: None }
    }

    pub fn with(board: &'a BoardState, mv: Move) -> Self {
        Self { board, extra: Some(mv) }
    }

    pub fn is_drawn(&self, mv: &Move) -> bool {
        self.extra.as_ref() == Some(mv) || self.board.is_drawn(mv)
    }

    /// Drawn sides of `b`.
    pub fn edge_count(&self, b: BoxCoord) -> u8 {
        box_sides(b)
            .iter()
            .filter(|side| self.is_drawn(side))
            .count() as u8
    }
}

/// The four sides of a box: top, bottom, left, right.
pub fn box_sides(b: BoxCoord) -> [Move; 4] {
    [
        Move::horizontal(b.row, b.col),
        Move::horizontal(b.row + 1, b.col),
        Move::vertical(b.row, b.col),
        Move::vertical(b.row, b.col + 1),
    ]
}

/// Every undrawn edge, horizontal first, row-major.
pub fn legal_moves(board: &BoardState) -> Vec<Move> {
    let mut moves = Vec::new();
    for (r, row) in board.horizontal_edges().iter().enumerate() {
        for (c, &drawn) in row.iter().enumerate() {
            if !drawn {
                moves.push(Move::horizontal(r, c));
            }
        }
    }
    for (r, row) in board.vertical_edges().iter().enumerate() {
        for (c, &drawn) in row.iter().enumerate() {
            if !drawn {
                moves.push(Move::vertical(r, c));
            }
        }
    }
    moves
}

/// Boxes bordering `mv` on a `rows x cols` dot grid (0, 1 or 2).
pub fn affected_boxes(rows: usize, cols: usize, mv: &Move) -> Vec<BoxCoord> {
    let mut boxes = Vec::with_capacity(2);
    match mv.kind {
        LineKind::Horizontal => {
            if mv.row >= rows || mv.col >= cols.saturating_sub(1) {
                return boxes;
            }
            if mv.row > 0 {
                boxes.push(BoxCoord { row: mv.row - 1, col: mv.col });
            }
            if mv.row + 1 < rows {
                boxes.push(BoxCoord { row: mv.row, col: mv.col });
            }
        }
        LineKind::Vertical => {
            if mv.row >= rows.saturating_sub(1) || mv.col >= cols {
                return boxes;
            }
            if mv.col > 0 {
                boxes.push(BoxCoord { row: mv.row, col: mv.col - 1 });
            }
            if mv.col + 1 < cols {
                boxes.push(BoxCoord { row: mv.row, col: mv.col });
            }
        }
    }
    boxes
}

/// Drawn sides of `b` if `hypothetical` were played as well.
pub fn edge_count_if_played(board: &BoardState, b: BoxCoord, hypothetical: Option<Move>) -> u8 {
    match hypothetical {
        Some(mv) => Overlay::with(board, mv).edge_count(b),
        None => Overlay::new(board).edge_count(b),
    }
}

/// Boxes `mv` would close right now: unclaimed and at four sides afterwards.
pub fn boxes_completed_by(board: &BoardState, mv: &Move) -> Vec<BoxCoord> {
    affected_boxes(board.rows(), board.cols(), mv)
        .into_iter()
        .filter(|&b| board.box_owner(b).is_none() && edge_count_if_played(board, b, Some(*mv)) == 4)
        .collect()
}

pub fn completes_a_box(board: &BoardState, mv: &Move) -> bool {
    !boxes_completed_by(board, mv).is_empty()
}

/// A move is safe when every unclaimed box it borders stays at two sides or
/// fewer: it neither closes a box nor leaves one a single edge from closing.
///
/// For moves that do not score this is the same as: after `mv`, no other
/// legal move can close a box that was not already one edge from closing.
/// Moves that close a box are classified as completing, never as safe.
pub fn is_safe(board: &BoardState, mv: &Move) -> bool {
    let after = Overlay::with(board, *mv);
    affected_boxes(board.rows(), board.cols(), mv)
        .into_iter()
        .filter(|&b| board.box_owner(b).is_none())
        .all(|b| after.edge_count(b) < 3)
}

/// Per-turn partition of the legal moves into three disjoint sets.
#[derive(Debug, Clone, Default)]
pub struct MoveClassification {
    pub legal: Vec<Move>,
    /// Close at least one box.
    pub completing: Vec<Move>,
    /// Hand nobody a box.
    pub safe: Vec<Move>,
    /// Leave a three-sided box for the next player.
    pub setup: Vec<Move>,
}

pub fn classify(board: &BoardState) -> MoveClassification {
    let legal = legal_moves(board);
    let mut out = MoveClassification::default();
    for mv in &legal {
        if completes_a_box(board, mv) {
            out.completing.push(*mv);
        } else if is_safe(board, mv) {
            out.safe.push(*mv);
        } else {
            out.setup.push(*mv);
        }
    }
    out.legal = legal;
    out
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    use super::*;
    use crate::engine::board::tests::two_players;

    fn board(rows: usize, cols: usize) -> BoardState {
        BoardState::new(rows, cols, two_players()).unwrap()
    }

    fn draw(b: &mut BoardState, moves: &[Move]) {
        for m in moves {
            b.set_drawn(m, true);
        }
    }

    #[test]
    fn affected_boxes_at_edges_and_interior() {
        // 3x3 dots, 2x2 boxes
        assert_eq!(affected_boxes(3, 3, &Move::horizontal(0, 0)), vec![BoxCoord { row: 0, col: 0 }]);
        assert_eq!(
            affected_boxes(3, 3, &Move::horizontal(1, 1)),
            vec![BoxCoord { row: 0, col: 1 }, BoxCoord { row: 1, col: 1 }]
        );
        assert_eq!(affected_boxes(3, 3, &Move::horizontal(2, 0)), vec![BoxCoord { row: 1, col: 0 }]);
        assert_eq!(affected_boxes(3, 3, &Move::vertical(1, 0)), vec![BoxCoord { row: 1, col: 0 }]);
        assert_eq!(
            affected_boxes(3, 3, &Move::vertical(0, 1)),
            vec![BoxCoord { row: 0, col: 0 }, BoxCoord { row: 0, col: 1 }]
        );
        assert_eq!(affected_boxes(3, 3, &Move::vertical(0, 2)), vec![BoxCoord { row: 0, col: 1 }]);
        assert!(affected_boxes(3, 3, &Move::vertical(2, 0)).is_empty());
        assert!(affected_boxes(3, 3, &Move::horizontal(0, 2)).is_empty());
        assert!(affected_boxes(3, 3, &Move::horizontal(0, usize::MAX)).is_empty());
        assert!(affected_boxes(3, 3, &Move::vertical(usize::MAX, 0)).is_empty());
    }

    #[test]
    fn hypothetical_count_is_side_independent() {
        let b = board(3, 3);
        let target = BoxCoord { row: 0, col: 0 };
        for side in box_sides(target) {
            assert_eq!(edge_count_if_played(&b, target, Some(side)), 1, "side {side}");
        }
        // A move not touching the box is ignored.
        assert_eq!(edge_count_if_played(&b, target, Some(Move::horizontal(2, 1))), 0);
        // An already-drawn edge is not counted twice.
        let mut b = board(3, 3);
        draw(&mut b, &[Move::horizontal(0, 0)]);
        assert_eq!(edge_count_if_played(&b, target, Some(Move::horizontal(0, 0))), 1);
    }

    #[test]
    fn completing_detection() {
        let mut b = board(3, 3);
        draw(&mut b, &[Move::horizontal(0, 0), Move::horizontal(1, 0), Move::vertical(0, 0)]);
        assert!(completes_a_box(&b, &Move::vertical(0, 1)));
        assert!(!completes_a_box(&b, &Move::vertical(1, 1)));
    }

    #[test]
    fn claimed_box_never_completes_again() {
        let mut b = board(3, 3);
        draw(&mut b, &box_sides(BoxCoord { row: 0, col: 0 }));
        b.box_owner[0][0] = Some(0);
        for mv in legal_moves(&b) {
            assert!(boxes_completed_by(&b, &mv).iter().all(|x| *x != BoxCoord { row: 0, col: 0 }));
        }
    }

    #[test]
    fn safe_moves_on_two_by_two_boxes() {
        let mut b = board(3, 3);
        // Top-left box has three sides; the box below it has one (shared h(1,0)).
        draw(&mut b, &[Move::horizontal(0, 0), Move::horizontal(1, 0), Move::vertical(0, 0)]);
        let c = classify(&b);
        let last_side = Move::vertical(0, 1);
        assert!(c.completing.contains(&last_side));
        assert!(!c.safe.contains(&last_side));
        assert!(!is_safe(&b, &last_side));

        // Bottom-left has only h(1,0); its left side brings it to two: safe.
        assert!(c.safe.contains(&Move::vertical(1, 0)));
        assert!(c.safe.contains(&Move::horizontal(2, 0)));

        // Now put the bottom-left box at two sides; its third side is a setup.
        draw(&mut b, &[Move::vertical(1, 0)]);
        let c = classify(&b);
        assert!(!c.safe.contains(&Move::horizontal(2, 0)));
        assert!(c.setup.contains(&Move::horizontal(2, 0)));
    }

    #[test]
    fn third_edge_of_a_box_is_not_safe() {
        let mut b = board(3, 3);
        // Two sides of the top-left box.
        draw(&mut b, &[Move::horizontal(0, 0), Move::vertical(0, 0)]);
        assert!(!is_safe(&b, &Move::horizontal(1, 0)));
        assert!(!is_safe(&b, &Move::vertical(0, 1)));
        // An edge of the one-sided bottom-right box is safe.
        draw(&mut b, &[Move::horizontal(2, 1)]);
        assert!(is_safe(&b, &Move::vertical(1, 2)));
    }

    /// The literal definition: after `mv`, can some other legal move close a
    /// box that was not already one edge from closing?
    fn is_safe_brute_force(b: &BoardState, mv: &Move) -> bool {
        let mut after = b.clone();
        after.set_drawn(mv, true);
        for m2 in legal_moves(&after) {
            for bx in affected_boxes(b.rows(), b.cols(), &m2) {
                let before = Overlay::new(b).edge_count(bx);
                let reached = Overlay::with(&after, m2).edge_count(bx);
                if reached == 4 && before != 3 && b.box_owner(bx).is_none() {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn is_safe_matches_literal_definition() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..40 {
            let mut b = board(4, 5);
            let mut all = legal_moves(&b);
            all.shuffle(&mut rng);
            for mv in all.iter().take(12) {
                b.set_drawn(mv, true);
            }
            for mv in legal_moves(&b) {
                if completes_a_box(&b, &mv) {
                    assert!(!is_safe(&b, &mv), "completing move {mv} marked safe");
                } else {
                    assert_eq!(is_safe(&b, &mv), is_safe_brute_force(&b, &mv), "move {mv}");
                }
            }
        }
    }

    #[test]
    fn classification_partitions_legal_moves() {
        let mut b = board(3, 4);
        draw(&mut b, &[Move::horizontal(0, 0), Move::vertical(0, 0), Move::horizontal(1, 0)]);
        let c = classify(&b);
        assert_eq!(c.completing.len() + c.safe.len() + c.setup.len(), c.legal.len());
        assert_eq!(c.completing, vec![Move::vertical(0, 1)]);
        assert!(c.safe.iter().all(|m| !c.completing.contains(m) && !c.setup.contains(m)));
    }
}
