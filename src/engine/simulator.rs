//! Local (shared-device) match: human and CPU seats around one board.
//!
//! `LocalMatch` is synchronous and owns the turn machine; `run_local_match`
//! is the event loop that serializes human input and delayed CPU decisions
//! onto it.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::mpsc;

use crate::engine::board::{BoardError, BoardState};
use crate::engine::bot_profiles::{BotProfilesFile, DifficultyProfile};
use crate::engine::bot_strategy::BotStrategy;
use crate::engine::models::*;
use crate::engine::presentation::{dispatch, Presentation};
use crate::engine::scheduler::Deferred;
use crate::engine::turn::{MatchMode, TurnMachine};

/// A CPU move waiting out its thinking time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuDecision {
    pub player: PlayerId,
    pub mv: Move,
    pub delay: Duration,
}

/// The CPU to move found nothing to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("CPU player {player} has no legal move")]
pub struct CpuStalled {
    pub player: PlayerId,
}

struct Seat {
    bot: Box<dyn BotStrategy>,
    profile: DifficultyProfile,
}

pub struct LocalMatch {
    rows: usize,
    cols: usize,
    players: Vec<PlayerRecord>,
    machine: TurnMachine,
    seats: Vec<Option<Seat>>,
}

impl LocalMatch {
    /// CPU seats are the players with a difficulty set; their parameters
    /// come from `profiles`.
    pub fn new(
        rows: usize,
        cols: usize,
        players: Vec<PlayerRecord>,
        profiles: &BotProfilesFile,
    ) -> Result<Self, BoardError> {
        let board = BoardState::new(rows, cols, players.clone())?;
        let seats = players
            .iter()
            .map(|p| {
                p.cpu.map(|tier| {
                    let profile = profiles.for_tier(tier);
                    Seat {
                        bot: profiles.strategy_for_tier(tier).build(tier.as_str(), profile.clone()),
                        profile,
                    }
                })
            })
            .collect();
        Ok(Self {
            rows,
            cols,
            players,
            machine: TurnMachine::new(board, MatchMode::Local),
            seats,
        })
    }

    pub fn board(&self) -> &BoardState {
        self.machine.board()
    }

    pub fn machine(&self) -> &TurnMachine {
        &self.machine
    }

    fn is_cpu(&self, player: PlayerId) -> bool {
        self.seats.get(player as usize).is_some_and(|s| s.is_some())
    }

    /// The CPU seat whose move is awaited, if any.
    pub fn cpu_to_move(&self) -> Option<PlayerId> {
        let board = self.machine.board();
        let p = board.current_player();
        (board.is_active() && self.is_cpu(p)).then_some(p)
    }

    /// Input from the shared device on behalf of whoever is to move.
    pub fn human_move(&mut self, mv: Move) -> Result<TransitionResult, MoveRejection> {
        let current = self.machine.board().current_player();
        if self.is_cpu(current) && self.machine.board().is_active() {
            return Err(MoveRejection::NotYourTurn { mover: current, current });
        }
        self.machine.apply_move(mv, current, false)
    }

    /// Pick a move for the CPU to play, with its thinking delay.
    pub fn decide_cpu(&self, rng: &mut dyn RngCore) -> Result<Option<CpuDecision>, CpuStalled> {
        let Some(player) = self.cpu_to_move() else {
            return Ok(None);
        };
        let Some(seat) = self.seats[player as usize].as_ref() else {
            return Ok(None);
        };
        let mv = seat
            .bot
            .choose_move(self.machine.board(), rng)
            .ok_or(CpuStalled { player })?;
        let delay = seat.profile.think_delay(rng);
        tracing::debug!(player, %mv, delay_ms = delay.as_millis() as u64, "CPU decided");
        Ok(Some(CpuDecision { player, mv, delay }))
    }

    /// Commit a CPU decision through the normal move path.
    pub fn commit_cpu(&mut self, decision: &CpuDecision) -> Result<TransitionResult, MoveRejection> {
        self.machine.apply_move(decision.mv, decision.player, false)
    }

    pub fn undo(&mut self) -> Option<Vec<Event>> {
        self.machine.undo()
    }

    /// Fresh board, same seats.
    pub fn reset(&mut self) -> Result<(), BoardError> {
        let board = BoardState::new(self.rows, self.cols, self.players.clone())?;
        self.machine = TurnMachine::new(board, MatchMode::Local);
        Ok(())
    }
}

/// Commands from the shared device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    Move(Move),
    Undo,
    Reset,
    Quit,
}

/// Drive a local match until `Quit`, or until the input closes and no CPU
/// is left to move. Returns the final board.
pub async fn run_local_match<P: Presentation>(
    mut game: LocalMatch,
    ui: &mut P,
    mut input: mpsc::UnboundedReceiver<LocalInput>,
    seed: Option<u64>,
) -> BoardState {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let (mut cpu, mut fired) = Deferred::<CpuDecision>::channel();
    let mut input_open = true;

    ui.redraw(game.board());
    loop {
        if !cpu.is_pending() {
            match game.decide_cpu(&mut rng) {
                Ok(Some(decision)) => {
                    ui.set_input_enabled(false);
                    cpu.schedule(decision.delay, decision);
                }
                Ok(None) => ui.set_input_enabled(game.board().is_active()),
                Err(stalled) => {
                    tracing::error!(error = %stalled, "CPU could not move; handing the seat to the device");
                    ui.show_message(&stalled.to_string());
                    ui.set_input_enabled(true);
                }
            }
        }
        if !input_open && !cpu.is_pending() {
            break;
        }

        tokio::select! {
            cmd = input.recv(), if input_open => match cmd {
                None => input_open = false,
                Some(LocalInput::Quit) => {
                    cpu.cancel();
                    break;
                }
                Some(LocalInput::Move(mv)) => match game.human_move(mv) {
                    Ok(result) => dispatch(&result.events, ui),
                    Err(rejection) => ui.show_message(&rejection.to_string()),
                },
                Some(LocalInput::Undo) => {
                    cpu.cancel();
                    match game.undo() {
                        Some(events) => {
                            ui.redraw(game.board());
                            dispatch(&events, ui);
                        }
                        None => ui.show_message("nothing to undo"),
                    }
                }
                Some(LocalInput::Reset) => {
                    cpu.cancel();
                    if let Err(e) = game.reset() {
                        ui.show_message(&e.to_string());
                    }
                    ui.redraw(game.board());
                }
            },
            Some(done) = fired.recv() => {
                if cpu.accept(&done) {
                    match game.commit_cpu(&done.payload) {
                        Ok(result) => dispatch(&result.events, ui),
                        Err(rejection) => tracing::warn!(%rejection, "CPU move rejected"),
                    }
                }
            }
        }
    }
    game.machine.into_board()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bot_profiles::{BotProfile, StrategyType};
    use crate::engine::presentation::RecordingPresentation;

    fn instant_profiles() -> BotProfilesFile {
        let mut file = BotProfilesFile::default();
        file.profiles.insert(
            "instant".into(),
            BotProfile {
                think_min_ms: Some(1),
                think_max_ms: Some(2),
                ..Default::default()
            },
        );
        file.production.hard = Some("instant".into());
        file.production.easy = Some("instant".into());
        file
    }

    fn seats(cpu0: Option<Difficulty>, cpu1: Option<Difficulty>) -> Vec<PlayerRecord> {
        let mut a = PlayerRecord::human(0, "Ann", "●", "#e74c3c");
        a.cpu = cpu0;
        let mut b = PlayerRecord::human(1, "Bob", "▲", "#3498db");
        b.cpu = cpu1;
        vec![a, b]
    }

    #[test]
    fn human_cannot_move_for_cpu() {
        let mut game = LocalMatch::new(3, 3, seats(Some(Difficulty::Hard), None), &instant_profiles()).unwrap();
        assert_eq!(game.cpu_to_move(), Some(0));
        assert!(matches!(game.human_move(Move::horizontal(0, 0)), Err(MoveRejection::NotYourTurn { .. })));
    }

    #[test]
    fn cpu_decision_goes_through_apply_move() {
        let mut game = LocalMatch::new(3, 3, seats(None, Some(Difficulty::Hard)), &instant_profiles()).unwrap();
        game.human_move(Move::horizontal(0, 0)).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let decision = game.decide_cpu(&mut rng).unwrap().expect("CPU to move");
        assert_eq!(decision.player, 1);
        assert!(decision.delay <= Duration::from_millis(2));
        game.commit_cpu(&decision).unwrap();
        assert!(game.board().is_drawn(&decision.mv));
        // Replaying the same decision is rejected by the idempotence guard.
        assert!(game.commit_cpu(&decision).is_err());
    }

    #[test]
    fn seat_strategy_follows_the_mapped_profile() {
        let mut profiles = instant_profiles();
        profiles.profiles.insert(
            "coin".into(),
            BotProfile { strategy_type: StrategyType::Random, ..Default::default() },
        );
        profiles.production.easy = Some("coin".into());
        let game = LocalMatch::new(3, 3, seats(Some(Difficulty::Easy), Some(Difficulty::Hard)), &profiles).unwrap();
        let names: Vec<Option<&str>> = game.seats.iter().map(|s| s.as_ref().map(|s| s.bot.name())).collect();
        assert_eq!(names, vec![Some("random"), Some("hard")]);
    }

    #[tokio::test]
    async fn two_cpus_finish_a_game() {
        let game = LocalMatch::new(
            3,
            4,
            seats(Some(Difficulty::Easy), Some(Difficulty::Hard)),
            &instant_profiles(),
        )
        .unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();
        drop(_tx);
        let mut ui = RecordingPresentation::default();
        let board = run_local_match(game, &mut ui, rx, Some(1)).await;
        assert!(!board.is_active());
        assert_eq!(board.filled_box_count(), 6);
        assert_eq!(board.scores().iter().sum::<u32>(), 6);
        assert!(ui.calls.iter().any(|c| c.starts_with("winners")));
    }

    #[tokio::test]
    async fn reset_discards_pending_cpu_move() {
        let mut profiles = instant_profiles();
        profiles.profiles.get_mut("instant").unwrap().think_min_ms = Some(200);
        profiles.profiles.get_mut("instant").unwrap().think_max_ms = Some(200);
        let game = LocalMatch::new(3, 3, seats(None, Some(Difficulty::Hard)), &profiles).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(LocalInput::Move(Move::horizontal(0, 0))).unwrap();
        tx.send(LocalInput::Reset).unwrap();
        tx.send(LocalInput::Quit).unwrap();
        let mut ui = RecordingPresentation::default();
        let board = run_local_match(game, &mut ui, rx, Some(2)).await;
        // The CPU's reply to h0,0 was cancelled by the reset.
        assert_eq!(crate::engine::evaluator::legal_moves(&board).len(), 12);
        assert!(board.is_active());
    }

    #[tokio::test]
    async fn undo_and_rejections_reach_the_ui() {
        let game = LocalMatch::new(3, 3, seats(None, None), &instant_profiles()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(LocalInput::Move(Move::horizontal(0, 0))).unwrap();
        tx.send(LocalInput::Move(Move::horizontal(0, 0))).unwrap();
        tx.send(LocalInput::Undo).unwrap();
        tx.send(LocalInput::Undo).unwrap();
        drop(tx);
        let mut ui = RecordingPresentation::default();
        let board = run_local_match(game, &mut ui, rx, None).await;
        assert!(!board.is_drawn(&Move::horizontal(0, 0)));
        assert_eq!(board.current_player(), 0);
        assert!(ui.calls.contains(&"message edge h0,0 is already drawn".to_string()));
        assert!(ui.calls.contains(&"message nothing to undo".to_string()));
    }
}
