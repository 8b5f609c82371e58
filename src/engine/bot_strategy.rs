//! Bot strategy trait and implementations.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::engine::board::BoardState;
use crate::engine::bot_profiles::DifficultyProfile;
use crate::engine::evaluator::{classify, legal_moves};
use crate::engine::models::Move;

/// A bot strategy picks one move for whoever is to play on `board`.
pub trait BotStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `None` only when no legal move is left.
    fn choose_move(&self, board: &BoardState, rng: &mut dyn RngCore) -> Option<Move>;
}

/// Picks a uniformly random legal move.
pub struct RandomStrategy;

impl BotStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_move(&self, board: &BoardState, rng: &mut dyn RngCore) -> Option<Move> {
        legal_moves(board).choose(rng).copied()
    }
}

/// Bernoulli draw that treats NaN as never and clamps anything else.
fn notices(rng: &mut dyn RngCore, chance: f64) -> bool {
    let chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
    rng.gen_bool(chance)
}

/// The tiered CPU opponent: takes boxes and avoids setups with
/// probabilities from its profile, otherwise samples a pool biased
/// towards safe moves.
pub struct HeuristicStrategy {
    pub label: String,
    pub profile: DifficultyProfile,
}

impl HeuristicStrategy {
    pub fn new(label: impl Into<String>, profile: DifficultyProfile) -> Self {
        Self { label: label.into(), profile }
    }
}

impl BotStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        &self.label
    }

    fn choose_move(&self, board: &BoardState, rng: &mut dyn RngCore) -> Option<Move> {
        let moves = classify(board);
        if moves.legal.is_empty() {
            return None;
        }
        let p = &self.profile;

        if !moves.completing.is_empty() && notices(rng, p.completion_notice) {
            return moves.completing.choose(rng).copied();
        }

        // Safe moves never score, so nothing is lost by skipping a box here:
        // a box we could take was either taken above or went unnoticed.
        if !moves.safe.is_empty() && notices(rng, p.blocking_notice) {
            return moves.safe.choose(rng).copied();
        }

        // Pool = safe x strategic_weight ++ legal x random_weight.
        let safe_span = moves.safe.len() * p.strategic_weight as usize;
        let pool = safe_span + moves.legal.len() * p.random_weight as usize;
        if pool == 0 {
            return moves.legal.choose(rng).copied();
        }
        let pick = rng.gen_range(0..pool);
        let mv = if pick < safe_span {
            moves.safe[pick % moves.safe.len()]
        } else {
            moves.legal[(pick - safe_span) % moves.legal.len()]
        };
        Some(mv)
    }
}
