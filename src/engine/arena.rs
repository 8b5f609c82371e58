//! Bot-vs-bot arena runner, used to tune CPU tiers.
//!
//! Games are independent, so they run in parallel via rayon; each game gets
//! its own seeded RNG and results are aggregated afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::engine::board::{BoardError, BoardState};
use crate::engine::bot_strategy::BotStrategy;
use crate::engine::models::*;
use crate::engine::turn::{MatchMode, TurnMachine};

const ARENA_ICONS: [&str; MAX_PLAYERS] = ["●", "▲", "■", "◆"];
const ARENA_COLORS: [&str; MAX_PLAYERS] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f"];

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub rows: usize,
    pub cols: usize,
    pub num_games: usize,
    pub base_seed: u64,
    /// Rotate seats between games so nobody always moves first.
    pub alternate_seats: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 5,
            num_games: 100,
            base_seed: 42,
            alternate_seats: true,
        }
    }
}

/// Aggregated results from an arena run.
pub struct ArenaResult {
    pub num_games: usize,
    pub names: Vec<String>,
    pub wins: HashMap<String, usize>,
    pub shared: usize,
    pub total_scores: HashMap<String, Vec<f64>>,
    pub game_durations_ms: Vec<f64>,
}

impl ArenaResult {
    pub fn win_rate(&self, name: &str) -> f64 {
        *self.wins.get(name).unwrap_or(&0) as f64 / self.num_games.max(1) as f64
    }

    pub fn avg_score(&self, name: &str) -> f64 {
        match self.total_scores.get(name) {
            Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
            _ => 0.0,
        }
    }

    pub fn score_stddev(&self, name: &str) -> f64 {
        let scores = match self.total_scores.get(name) {
            Some(s) if s.len() >= 2 => s,
            _ => return 0.0,
        };
        let avg = self.avg_score(name);
        let variance = scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / (scores.len() - 1) as f64;
        variance.sqrt()
    }

    /// Wilson score interval for the win rate.
    pub fn confidence_interval_95(&self, name: &str) -> (f64, f64) {
        let n = self.num_games;
        if n == 0 {
            return (0.0, 0.0);
        }
        let p = self.win_rate(name);
        let z = 1.96_f64;
        let denom = 1.0 + z * z / n as f64;
        let center = (p + z * z / (2.0 * n as f64)) / denom;
        let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n as f64)) / n as f64).sqrt() / denom;
        ((center - margin).max(0.0), (center + margin).min(1.0))
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Arena Results ({} games)", self.num_games)];
        lines.push("=".repeat(60));
        for name in &self.names {
            let (ci_lo, ci_hi) = self.confidence_interval_95(name);
            lines.push(format!(
                "  {:>12}: {:3} wins ({:5.1}%)  [95% CI: {:.1}%-{:.1}%]  avg={:5.1} +/- {:4.1}",
                name,
                self.wins.get(name).copied().unwrap_or(0),
                self.win_rate(name) * 100.0,
                ci_lo * 100.0,
                ci_hi * 100.0,
                self.avg_score(name),
                self.score_stddev(name),
            ));
        }
        lines.push(format!("  {:>12}: {}", "Shared", self.shared));
        if !self.game_durations_ms.is_empty() {
            let total_ms = self.game_durations_ms.iter().sum::<f64>();
            lines.push(format!(
                "  Avg game: {:.2}ms  |  Total: {:.2}s",
                total_ms / self.game_durations_ms.len() as f64,
                total_ms / 1000.0
            ));
        }
        lines.join("\n")
    }
}

struct GameOutcome {
    seats: Vec<usize>,
    result: GameResult,
    elapsed_ms: f64,
}

/// Run `config.num_games` between the entrants (one seat each) and return
/// aggregated stats. The progress callback may be invoked from any thread.
pub fn run_arena(
    entrants: &[(String, Box<dyn BotStrategy>)],
    config: &ArenaConfig,
    progress_callback: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Result<ArenaResult, BoardError> {
    let n = entrants.len();
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n) {
        return Err(BoardError::PlayerCount { count: n });
    }

    let done = AtomicUsize::new(0);
    let outcomes: Vec<GameOutcome> = (0..config.num_games)
        .into_par_iter()
        .map(|game_idx| -> Result<GameOutcome, BoardError> {
            let seats: Vec<usize> = if config.alternate_seats {
                (0..n).map(|i| (i + game_idx) % n).collect()
            } else {
                (0..n).collect()
            };
            let mut rng = StdRng::seed_from_u64(config.base_seed.wrapping_add(game_idx as u64));
            let t0 = Instant::now();
            let result = play_one_game(entrants, &seats, config, &mut rng)?;
            let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
            if let Some(cb) = progress_callback {
                cb(done.fetch_add(1, Ordering::Relaxed) + 1, config.num_games);
            }
            Ok(GameOutcome { seats, result, elapsed_ms })
        })
        .collect::<Result<_, _>>()?;

    let names: Vec<String> = entrants.iter().map(|(name, _)| name.clone()).collect();
    let mut result = ArenaResult {
        num_games: config.num_games,
        wins: names.iter().map(|n| (n.clone(), 0)).collect(),
        total_scores: names.iter().map(|n| (n.clone(), Vec::new())).collect(),
        names,
        shared: 0,
        game_durations_ms: Vec::with_capacity(outcomes.len()),
    };
    for outcome in outcomes {
        result.game_durations_ms.push(outcome.elapsed_ms);
        for (seat, &entrant) in outcome.seats.iter().enumerate() {
            let name = &result.names[entrant];
            if let Some(scores) = result.total_scores.get_mut(name) {
                scores.push(outcome.result.final_scores[seat] as f64);
            }
        }
        if outcome.result.is_shared() {
            result.shared += 1;
        } else if let Some(&winner) = outcome.result.winners.first() {
            let name = &result.names[outcome.seats[winner as usize]];
            if let Some(w) = result.wins.get_mut(name) {
                *w += 1;
            }
        }
    }
    Ok(result)
}

fn seat_records(entrants: &[(String, Box<dyn BotStrategy>)], seats: &[usize]) -> Vec<PlayerRecord> {
    seats
        .iter()
        .enumerate()
        .map(|(seat, &entrant)| {
            PlayerRecord::human(seat as PlayerId, &entrants[entrant].0, ARENA_ICONS[seat], ARENA_COLORS[seat])
        })
        .collect()
}

fn play_one_game(
    entrants: &[(String, Box<dyn BotStrategy>)],
    seats: &[usize],
    config: &ArenaConfig,
    rng: &mut StdRng,
) -> Result<GameResult, BoardError> {
    let board = BoardState::new(config.rows, config.cols, seat_records(entrants, seats))?;
    let mut machine = TurnMachine::new(board, MatchMode::Local);
    while machine.board().is_active() {
        let player = machine.board().current_player();
        let strategy = &entrants[seats[player as usize]].1;
        let Some(mv) = strategy.choose_move(machine.board(), rng) else {
            tracing::error!(player, strategy = strategy.name(), "no legal move in an active arena game");
            break;
        };
        if let Err(rejection) = machine.apply_move(mv, player, false) {
            tracing::error!(%rejection, strategy = strategy.name(), "arena strategy produced an illegal move");
            break;
        }
    }
    Ok(machine.board().result())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bot_profiles::DifficultyProfile;
    use crate::engine::bot_strategy::{HeuristicStrategy, RandomStrategy};

    fn entrants(a: Box<dyn BotStrategy>, b: Box<dyn BotStrategy>) -> Vec<(String, Box<dyn BotStrategy>)> {
        vec![(a.name().to_string(), a), (b.name().to_string(), b)]
    }

    #[test]
    fn every_game_is_accounted_for() {
        let config = ArenaConfig { rows: 3, cols: 3, num_games: 12, ..Default::default() };
        let field = entrants(
            Box::new(RandomStrategy),
            Box::new(HeuristicStrategy::new("easy", DifficultyProfile::builtin(Difficulty::Easy))),
        );
        let counted = AtomicUsize::new(0);
        let cb = |_done: usize, total: usize| {
            assert_eq!(total, 12);
            counted.fetch_add(1, Ordering::Relaxed);
        };
        let result = run_arena(&field, &config, Some(&cb)).unwrap();
        assert_eq!(counted.load(Ordering::Relaxed), 12);
        assert_eq!(result.wins.values().sum::<usize>() + result.shared, 12);
        for name in &result.names {
            let scores = &result.total_scores[name];
            assert_eq!(scores.len(), 12);
        }
        // Every box goes to someone.
        let per_game: f64 = result.names.iter().map(|n| result.avg_score(n)).sum();
        assert!((per_game - 4.0).abs() < 1e-9);
        assert!(result.summary().contains("Arena Results (12 games)"));
    }

    #[test]
    fn hard_beats_random() {
        let config = ArenaConfig { rows: 5, cols: 5, num_games: 60, base_seed: 7, alternate_seats: true };
        let field = entrants(
            Box::new(HeuristicStrategy::new("hard", DifficultyProfile::builtin(Difficulty::Hard))),
            Box::new(RandomStrategy),
        );
        let result = run_arena(&field, &config, None).unwrap();
        assert!(
            result.win_rate("hard") > result.win_rate("random"),
            "{}",
            result.summary()
        );
        assert!(result.avg_score("hard") > result.avg_score("random"));
    }

    #[test]
    fn bad_setup_is_reported() {
        let one = vec![("solo".to_string(), Box::new(RandomStrategy) as Box<dyn BotStrategy>)];
        assert!(matches!(
            run_arena(&one, &ArenaConfig::default(), None),
            Err(BoardError::PlayerCount { count: 1 })
        ));
        let config = ArenaConfig { rows: 40, ..Default::default() };
        let field = entrants(Box::new(RandomStrategy), Box::new(RandomStrategy));
        assert!(run_arena(&field, &config, None).is_err());
    }

    #[test]
    fn confidence_interval_brackets_win_rate() {
        let result = ArenaResult {
            num_games: 10,
            names: vec!["a".into()],
            wins: [("a".to_string(), 7)].into_iter().collect(),
            shared: 0,
            total_scores: HashMap::new(),
            game_durations_ms: vec![],
        };
        let (lo, hi) = result.confidence_interval_95("a");
        assert!(lo < 0.7 && 0.7 < hi);
    }
}
