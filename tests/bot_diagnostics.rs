//! CPU-vs-CPU diagnostic simulations.
//!
//! These are NOT run in CI. Use them locally to check that the tiers keep
//! their ordering after a profile change, and to catch integration issues
//! (e.g. a profile that never notices boxes).
//!
//! Run with:
//!     cargo test --release --test bot_diagnostics -- --ignored --nocapture

use rand::rngs::StdRng;
use rand::SeedableRng;

use boxes_game_engine::engine::arena::{run_arena, ArenaConfig};
use boxes_game_engine::engine::board::BoardState;
use boxes_game_engine::engine::bot_profiles::{DifficultyProfile, BUILTIN_PROFILES};
use boxes_game_engine::engine::bot_strategy::{BotStrategy, HeuristicStrategy, RandomStrategy};
use boxes_game_engine::engine::evaluator::{classify, is_safe};
use boxes_game_engine::engine::models::*;
use boxes_game_engine::engine::turn::{MatchMode, TurnMachine};

fn tier(t: Difficulty) -> Box<dyn BotStrategy> {
    Box::new(HeuristicStrategy::new(t.as_str(), BUILTIN_PROFILES.for_tier(t)))
}

/// Each tier against the ones below it. Baseline: the stronger side wins
/// more games than the weaker one.
#[test]
#[ignore]
fn tiers_are_ordered() {
    let pairs = [
        (Difficulty::Hard, Difficulty::Medium),
        (Difficulty::Medium, Difficulty::Easy),
        (Difficulty::Hard, Difficulty::Easy),
    ];
    for (strong, weak) in pairs {
        let entrants = vec![(strong.as_str().to_string(), tier(strong)), (weak.as_str().to_string(), tier(weak))];
        let config = ArenaConfig { rows: 6, cols: 6, num_games: 300, ..Default::default() };
        let result = run_arena(&entrants, &config, None).unwrap();
        println!("\n{}", result.summary());

        let (s, w) = (result.win_rate(strong.as_str()), result.win_rate(weak.as_str()));
        assert!(
            s > w,
            "{} ({:.0}%) should beat {} ({:.0}%)",
            strong.as_str(),
            s * 100.0,
            weak.as_str(),
            w * 100.0
        );
    }
}

/// Easy against a uniformly random player. Baseline: even easy should not
/// lose to random play.
#[test]
#[ignore]
fn easy_vs_random() {
    let entrants: Vec<(String, Box<dyn BotStrategy>)> =
        vec![("easy".into(), tier(Difficulty::Easy)), ("random".into(), Box::new(RandomStrategy))];
    let config = ArenaConfig { num_games: 300, ..Default::default() };
    let result = run_arena(
        &entrants,
        &config,
        Some(&|done, total| {
            if done % 50 == 0 {
                eprintln!("  game {}/{}", done, total);
            }
        }),
    )
    .unwrap();
    println!("\n{}", result.summary());
    println!(
        "\n  easy avg={:.1} (+/-{:.1})  random avg={:.1} (+/-{:.1})",
        result.avg_score("easy"),
        result.score_stddev("easy"),
        result.avg_score("random"),
        result.score_stddev("random"),
    );
    assert!(result.win_rate("easy") >= result.win_rate("random"));
}

/// Four-way table on the largest grid, checking seat rotation keeps the
/// first-move advantage from skewing the totals.
#[test]
#[ignore]
fn four_player_largest_grid() {
    let entrants: Vec<(String, Box<dyn BotStrategy>)> = vec![
        ("hard".into(), tier(Difficulty::Hard)),
        ("medium".into(), tier(Difficulty::Medium)),
        ("easy".into(), tier(Difficulty::Easy)),
        ("random".into(), Box::new(RandomStrategy)),
    ];
    let config = ArenaConfig { rows: MAX_DOTS, cols: MAX_DOTS, num_games: 40, ..Default::default() };
    let result = run_arena(&entrants, &config, None).unwrap();
    println!("\n{}", result.summary());

    let boxes = ((MAX_DOTS - 1) * (MAX_DOTS - 1)) as f64;
    let total: f64 = entrants.iter().map(|(name, _)| result.avg_score(name)).sum();
    assert!((total - boxes).abs() < 1e-6, "average scores must add up to the box count");
}

/// A perfect-notice profile must never hand over a box while a safe move
/// exists. Plays whole games and checks every decision.
#[test]
#[ignore]
fn perfect_notice_never_gives_away_boxes_early() {
    let profile = DifficultyProfile {
        completion_notice: 1.0,
        blocking_notice: 1.0,
        ..DifficultyProfile::builtin(Difficulty::Hard)
    };
    let bot = HeuristicStrategy::new("perfect", profile);
    let players = vec![
        PlayerRecord::human(0, "a", "●", "#e74c3c"),
        PlayerRecord::human(1, "b", "▲", "#3498db"),
    ];

    let mut checked = 0usize;
    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let board = BoardState::new(7, 7, players.clone()).unwrap();
        let mut machine = TurnMachine::new(board, MatchMode::Local);
        while machine.board().is_active() {
            let before = classify(machine.board());
            let mv = bot.choose_move(machine.board(), &mut rng).unwrap();
            if !before.completing.is_empty() {
                assert!(before.completing.contains(&mv), "seed {seed}: skipped a box");
            } else if !before.safe.is_empty() {
                assert!(is_safe(machine.board(), &mv), "seed {seed}: gave away a box with {mv}");
            }
            let mover = machine.board().current_player();
            machine.apply_move(mv, mover, false).unwrap();
            checked += 1;
        }
    }
    println!("checked {checked} decisions");
}
