use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use boxes_game_engine::engine::bot_profiles::{load_default_profiles, load_profiles};
use boxes_game_engine::engine::models::{Difficulty, PlayerId, PlayerRecord};
use boxes_game_engine::engine::simulator::{run_local_match, LocalInput, LocalMatch};
use boxes_game_engine::net::peer::{run_peer, PeerCommand, PeerConfig};
use boxes_game_engine::net::session::{PeerSession, Role, COLOR_PALETTE, ICON_PALETTE};
use boxes_game_engine::net::transport::Connection;
use boxes_game_engine::terminal::{parse_command, TerminalCommand, TerminalPresentation, HELP};

#[derive(Parser)]
#[command(name = "boxes", about = "Dots and boxes in the terminal, locally or over TCP")]
struct Cli {
    /// Path to bot_profiles.toml (default: auto-discover)
    #[arg(long, env = "BOXES_PROFILES", global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play on this device against people or CPUs
    Local {
        /// Dot rows
        #[arg(long, default_value = "5")]
        rows: usize,

        /// Dot columns
        #[arg(long, default_value = "5")]
        cols: usize,

        /// One per seat: a player name, or "cpu:easy|medium|hard"
        #[arg(long = "seat")]
        seats: Vec<String>,

        /// Seed for CPU choices and thinking time
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Wait for the other player to connect (they host the match)
    Listen {
        /// Address to accept on
        #[arg(long, env = "BOXES_ADDR", default_value = "0.0.0.0:7878")]
        bind: String,

        #[command(flatten)]
        player: PlayerArgs,

        /// Seconds between full-state resyncs (0 disables)
        #[arg(long, default_value = "15")]
        resync_secs: u64,
    },

    /// Dial a waiting player and host the match
    Connect {
        /// Address of the listening player
        #[arg(env = "BOXES_PEER")]
        peer: String,

        /// Dot rows
        #[arg(long, default_value = "5")]
        rows: usize,

        /// Dot columns
        #[arg(long, default_value = "5")]
        cols: usize,

        #[command(flatten)]
        player: PlayerArgs,

        /// Seconds between full-state resyncs (0 disables)
        #[arg(long, default_value = "15")]
        resync_secs: u64,
    },
}

#[derive(Args)]
struct PlayerArgs {
    /// Display name
    #[arg(long, default_value = "Player 1")]
    name: String,

    /// Icon drawn in claimed boxes
    #[arg(long, default_value = "●")]
    icon: String,

    /// Hex color
    #[arg(long, default_value = "#e74c3c")]
    color: String,
}

impl PlayerArgs {
    fn record(&self) -> PlayerRecord {
        PlayerRecord::human(0, &self.name, &self.icon, &self.color)
    }
}

fn seat_records(entries: &[String]) -> Result<Vec<PlayerRecord>, String> {
    let defaults = ["Player 1".to_string(), "cpu:medium".to_string()];
    let entries = if entries.is_empty() { &defaults[..] } else { entries };
    entries
        .iter()
        .enumerate()
        .map(|(seat, entry)| {
            let id = seat as PlayerId;
            let icon = ICON_PALETTE[seat % ICON_PALETTE.len()];
            let color = COLOR_PALETTE[seat % COLOR_PALETTE.len()];
            match entry.strip_prefix("cpu:") {
                Some(tier) => {
                    let tier = Difficulty::parse(tier).ok_or_else(|| format!("unknown CPU tier '{tier}'"))?;
                    Ok(PlayerRecord::cpu(id, &format!("CPU ({})", tier.as_str()), icon, color, tier))
                }
                None => Ok(PlayerRecord::human(id, entry, icon, color)),
            }
        })
        .collect()
}

/// Read stdin on a plain thread so a blocked read never holds up runtime
/// shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn forward_local(mut lines: mpsc::UnboundedReceiver<String>, tx: mpsc::UnboundedSender<LocalInput>) {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            let input = match parse_command(&line) {
                Ok(TerminalCommand::Move(mv)) => LocalInput::Move(mv),
                Ok(TerminalCommand::Undo) => LocalInput::Undo,
                Ok(TerminalCommand::Restart) => LocalInput::Reset,
                Ok(TerminalCommand::Quit) => LocalInput::Quit,
                Ok(TerminalCommand::Answer(_)) => {
                    println!("nothing to answer");
                    continue;
                }
                Ok(TerminalCommand::Help) => {
                    println!("{HELP}");
                    continue;
                }
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            let quit = input == LocalInput::Quit;
            if tx.send(input).is_err() || quit {
                break;
            }
        }
    });
}

fn forward_peer(mut lines: mpsc::UnboundedReceiver<String>, tx: mpsc::UnboundedSender<PeerCommand>) {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            let cmd = match parse_command(&line) {
                Ok(TerminalCommand::Move(mv)) => PeerCommand::Move(mv),
                Ok(TerminalCommand::Restart) => PeerCommand::RequestRestart,
                Ok(TerminalCommand::Answer(accept)) => PeerCommand::AnswerRestart(accept),
                Ok(TerminalCommand::Quit) => PeerCommand::Leave,
                Ok(TerminalCommand::Undo) => {
                    println!("undo is only available in local matches");
                    continue;
                }
                Ok(TerminalCommand::Help) => {
                    println!("{HELP}");
                    continue;
                }
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            let leave = cmd == PeerCommand::Leave;
            if tx.send(cmd).is_err() || leave {
                break;
            }
        }
    });
}

async fn play_networked(
    session: PeerSession,
    conn: Connection,
    resync_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::unbounded_channel();
    forward_peer(stdin_lines(), tx);
    let config = PeerConfig {
        resync_interval: (resync_secs > 0).then(|| Duration::from_secs(resync_secs)),
    };
    let mut ui = TerminalPresentation::new(std::io::stdout());
    let session = run_peer(session, conn, &mut ui, rx, config).await;
    tracing::info!(sequence = session.last_applied_sequence(), "networked match finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the board on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Local { rows, cols, seats, seed } => {
            let profiles = match &cli.profiles {
                Some(path) => load_profiles(path).map_err(|e| format!("Failed to load profiles: {}", e))?,
                None => load_default_profiles(),
            };
            let game = LocalMatch::new(rows, cols, seat_records(&seats)?, &profiles)?;
            println!("{HELP}");
            let (tx, rx) = mpsc::unbounded_channel();
            forward_local(stdin_lines(), tx);
            let mut ui = TerminalPresentation::new(std::io::stdout());
            let board = run_local_match(game, &mut ui, rx, seed).await;
            tracing::info!(scores = ?board.scores(), "local match finished");
        }
        Command::Listen { bind, player, resync_secs } => {
            // Board size comes from the host's configuration.
            let session = PeerSession::new(player.record(), 5, 5)?;
            let listener = TcpListener::bind(&bind).await?;
            println!("waiting for a player on {}", listener.local_addr()?);
            let conn = Connection::accept(&listener).await?;
            println!("{} connected", conn.peer_addr());
            play_networked(session, conn, resync_secs).await?;
        }
        Command::Connect { peer, rows, cols, player, resync_secs } => {
            let mut session = PeerSession::new(player.record(), rows, cols)?;
            session.assign_role(Role::Host);
            session.connecting();
            println!("connecting to {peer}");
            let conn = Connection::connect(peer.as_str()).await?;
            play_networked(session, conn, resync_secs).await?;
        }
    }

    Ok(())
}
