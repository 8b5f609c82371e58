//! Arena CLI: run CPU-vs-CPU experiments from the command line.
//!
//! Usage:
//!   cargo run --release --bin arena -- --games 200 --player hard --player easy
//!   cargo run --release --bin arena -- --rows 6 --cols 6 --player sharp --player random --player medium

use std::path::PathBuf;

use clap::Parser;

use boxes_game_engine::engine::arena::{run_arena, ArenaConfig};
use boxes_game_engine::engine::bot_profiles::{
    load_default_profiles, load_profiles, BotProfilesFile, DifficultyProfile, StrategyType,
};
use boxes_game_engine::engine::bot_strategy::BotStrategy;
use boxes_game_engine::engine::models::{Difficulty, MAX_PLAYERS, MIN_PLAYERS};

#[derive(Parser)]
#[command(name = "arena", about = "Run CPU-vs-CPU arena experiments for dots and boxes")]
struct Cli {
    /// Number of games to play
    #[arg(long, default_value = "100")]
    games: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Dot rows
    #[arg(long, default_value = "5")]
    rows: usize,

    /// Dot columns
    #[arg(long, default_value = "5")]
    cols: usize,

    /// Rotate seat positions between games
    #[arg(long, default_value = "true")]
    alternate_seats: bool,

    /// Path to bot_profiles.toml
    #[arg(long, env = "BOXES_PROFILES")]
    profiles: Option<PathBuf>,

    /// One per seat: a tier (easy/medium/hard), a profile name, or "random"
    #[arg(long = "player", required = true)]
    players: Vec<String>,
}

/// Strategy and parameters for one `--player` entry. Profiles pick their
/// bot through `strategy_type`; a bare "random" works without a file entry.
fn resolve_entrant(entry: &str, profiles: &BotProfilesFile) -> Result<(StrategyType, DifficultyProfile), String> {
    if let Some(tier) = Difficulty::parse(entry) {
        return Ok((profiles.strategy_for_tier(tier), profiles.for_tier(tier)));
    }
    if let Some(found) = profiles.named_strategy(entry) {
        return Ok(found);
    }
    if entry == "random" {
        return Ok((StrategyType::Random, DifficultyProfile::builtin(Difficulty::Medium)));
    }
    let mut known: Vec<&String> = profiles.profiles.keys().collect();
    known.sort();
    Err(format!("unknown player '{entry}' (profiles: {known:?})"))
}

fn print_config(label: &str, kind: StrategyType, p: &DifficultyProfile) {
    match kind {
        StrategyType::Random => eprintln!("  {label}: random"),
        StrategyType::Heuristic => eprintln!(
            "  {label}: heuristic, completion={:.2}, blocking={:.2}, pool={}:{}",
            p.completion_notice, p.blocking_notice, p.strategic_weight, p.random_weight,
        ),
    }
}

fn main() {
    let cli = Cli::parse();

    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&cli.players.len()) {
        eprintln!("Error: need between {MIN_PLAYERS} and {MAX_PLAYERS} --player entries");
        std::process::exit(2);
    }

    let profiles = match &cli.profiles {
        Some(path) => load_profiles(path).unwrap_or_else(|e| {
            eprintln!("Error loading profiles: {}", e);
            std::process::exit(1);
        }),
        None => load_default_profiles(),
    };

    eprintln!(
        "Arena: {} games on {}x{} dots, seed={}, alternate_seats={}",
        cli.games, cli.rows, cli.cols, cli.seed, cli.alternate_seats
    );

    let mut entrants: Vec<(String, Box<dyn BotStrategy>)> = Vec::with_capacity(cli.players.len());
    for (seat, entry) in cli.players.iter().enumerate() {
        let (kind, profile) = resolve_entrant(entry, &profiles).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        // Same profile twice still needs two distinct names in the results.
        let name = if cli.players[..seat].contains(entry) {
            format!("{entry}#{}", seat + 1)
        } else {
            entry.clone()
        };
        print_config(&name, kind, &profile);
        let strategy = kind.build(name.clone(), profile);
        entrants.push((name, strategy));
    }
    eprintln!();

    let config = ArenaConfig {
        rows: cli.rows,
        cols: cli.cols,
        num_games: cli.games,
        base_seed: cli.seed,
        alternate_seats: cli.alternate_seats,
    };
    let total = cli.games;
    let progress_cb = move |done: usize, _total: usize| {
        eprint!("\r  [{}/{}] games completed", done, total);
    };

    match run_arena(&entrants, &config, Some(&progress_cb)) {
        Ok(result) => {
            eprintln!("\r                                    "); // clear progress line
            println!("{}", result.summary());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
