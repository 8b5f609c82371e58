//! Peer session: keeps this side's board in step with the peer's.
//!
//! The session does no I/O. The driver reports transport events, feeds
//! inbound messages through [`PeerSession::handle_message`], and after every
//! call drains [`PeerSession::take_outbound`] to the wire and
//! [`PeerSession::take_events`] to the presentation. All board mutation goes
//! through the session's `TurnMachine`.

use std::collections::VecDeque;
use std::fmt;

use derive_more::{Display, Error};

use crate::engine::board::{BoardError, BoardState};
use crate::engine::models::*;
use crate::engine::turn::{MatchMode, TurnMachine};
use crate::net::protocol::{FullStateSnapshot, PeerMessage};

/// Networked matches are always head to head.
pub const NETWORK_PLAYERS: usize = 2;

pub const ICON_PALETTE: [&str; 6] = ["●", "▲", "■", "◆", "★", "✚"];
pub const COLOR_PALETTE: [&str; 6] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22"];
const FALLBACK_NAME: &str = "Player 2";

/// Fixed by connection direction: the initiator hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Host,
    Joiner,
}

impl Role {
    pub fn identity(self) -> PlayerId {
        match self {
            Role::Host => 0,
            Role::Joiner => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Host => "host",
            Role::Joiner => "joiner",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    RoleAssigned,
    TransportConnecting,
    TransportOpen,
    Handshaking,
    Synced,
    SyncedGameOver,
    Disconnected,
}

/// What the presentation should hear about after a session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Board(Event),
    /// The board was replaced wholesale.
    Redraw,
    InputEnabled(bool),
    Notice(String),
    RestartRequested { requester_name: String },
    RestartDeclined,
    Restarted,
    Disconnected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    #[display("not in a running match")]
    NotSynced,
    #[display("waiting for the other player")]
    NotYourTurn,
    #[display("{rejection}")]
    Rejected { rejection: MoveRejection },
    #[display("a rematch request is already pending")]
    RestartPending,
    #[display("nobody asked for a rematch")]
    NoRestartRequest,
}

/// Give the joiner a seat that renders differently from the host's.
///
/// Deterministic: a clashing icon or color moves to the next palette entry
/// after the host's, a clashing or blank name gets a fallback.
pub fn resolve_collision(host: &PlayerRecord, mut joiner: PlayerRecord) -> PlayerRecord {
    joiner.identity = Role::Joiner.identity();
    joiner.score = 0;
    joiner.cpu = None;
    if joiner.icon == host.icon {
        joiner.icon = next_distinct(&ICON_PALETTE, &host.icon).to_string();
    }
    if joiner.color.eq_ignore_ascii_case(&host.color) {
        joiner.color = next_distinct(&COLOR_PALETTE, &host.color).to_string();
    }
    let name = joiner.name.trim();
    joiner.name = if name.is_empty() { FALLBACK_NAME.to_string() } else { name.to_string() };
    if joiner.name.eq_ignore_ascii_case(host.name.trim()) {
        joiner.name = format!("{} 2", joiner.name);
    }
    joiner
}

fn next_distinct<'a>(palette: &[&'a str], taken: &str) -> &'a str {
    match palette.iter().position(|p| p.eq_ignore_ascii_case(taken)) {
        Some(i) => palette[(i + 1) % palette.len()],
        None => palette[0],
    }
}

pub struct PeerSession {
    state: SessionState,
    role: Option<Role>,
    local: PlayerRecord,
    peer: Option<PlayerRecord>,
    rows: usize,
    cols: usize,
    machine: Option<TurnMachine>,
    last_applied_sequence: u64,
    paired: bool,
    restart_requested: bool,
    restart_incoming: bool,
    outbound: VecDeque<PeerMessage>,
    events: VecDeque<SessionEvent>,
}

impl PeerSession {
    /// `rows`/`cols` are used when this side ends up hosting; a joiner adopts
    /// the host's dimensions.
    pub fn new(local: PlayerRecord, rows: usize, cols: usize) -> Result<Self, BoardError> {
        let ok = |n: usize| (MIN_DOTS..=MAX_DOTS).contains(&n);
        if !ok(rows) || !ok(cols) {
            return Err(BoardError::Dimensions { rows, cols });
        }
        Ok(Self {
            state: SessionState::Idle,
            role: None,
            local,
            peer: None,
            rows,
            cols,
            machine: None,
            last_applied_sequence: 0,
            paired: false,
            restart_requested: false,
            restart_incoming: false,
            outbound: VecDeque::new(),
            events: VecDeque::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn local_player(&self) -> &PlayerRecord {
        &self.local
    }

    pub fn peer_player(&self) -> Option<&PlayerRecord> {
        self.peer.as_ref()
    }

    pub fn board(&self) -> Option<&BoardState> {
        self.machine.as_ref().map(TurnMachine::board)
    }

    pub fn last_applied_sequence(&self) -> u64 {
        self.last_applied_sequence
    }

    pub fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn is_my_turn(&self) -> bool {
        self.state == SessionState::Synced
            && self
                .board()
                .is_some_and(|b| b.is_active() && b.current_player() == self.local.identity)
    }

    /// Per-edge query for the presentation.
    pub fn is_edge_enabled(&self, mv: &Move) -> bool {
        self.is_my_turn()
            && self
                .machine
                .as_ref()
                .is_some_and(|m| m.is_edge_enabled(mv, self.local.identity))
    }

    pub fn take_outbound(&mut self) -> Vec<PeerMessage> {
        self.outbound.drain(..).collect()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // ------------------------------------------------------------------ //
    //  Transport lifecycle
    // ------------------------------------------------------------------ //

    pub fn assign_role(&mut self, role: Role) {
        if self.state != SessionState::Idle {
            tracing::warn!(%role, state = ?self.state, "role already fixed, ignoring reassignment");
            return;
        }
        self.role = Some(role);
        self.local.identity = role.identity();
        self.state = SessionState::RoleAssigned;
        tracing::debug!(%role, "role assigned");
    }

    pub fn connecting(&mut self) {
        if self.state == SessionState::RoleAssigned {
            self.state = SessionState::TransportConnecting;
        }
    }

    /// The link is up; the host opens the handshake.
    pub fn transport_opened(&mut self) {
        let Some(role) = self.role else {
            tracing::warn!("transport opened before a role was assigned");
            return;
        };
        if !matches!(self.state, SessionState::RoleAssigned | SessionState::TransportConnecting) {
            tracing::warn!(state = ?self.state, "unexpected transport open");
            return;
        }
        self.state = SessionState::TransportOpen;
        self.paired = true;
        tracing::info!(%role, "peer connected");
        self.begin_handshake();
    }

    pub fn transport_closed(&mut self) {
        self.disconnect("the other player disconnected");
    }

    pub fn transport_error(&mut self, error: &str) {
        tracing::error!(error, "transport failure");
        self.disconnect(&format!("connection error: {error}"));
    }

    /// Leave the match locally.
    pub fn leave(&mut self) {
        self.disconnect("left the match");
    }

    fn disconnect(&mut self, reason: &str) {
        if matches!(self.state, SessionState::Idle | SessionState::Disconnected) {
            return;
        }
        self.state = SessionState::Disconnected;
        self.paired = false;
        self.restart_requested = false;
        self.restart_incoming = false;
        if let Some(machine) = self.machine.as_mut() {
            machine.halt();
        }
        tracing::info!(role = ?self.role, reason, "session closed");
        self.events.push_back(SessionEvent::InputEnabled(false));
        self.events.push_back(SessionEvent::Disconnected { reason: reason.to_string() });
    }

    fn begin_handshake(&mut self) {
        self.state = SessionState::Handshaking;
        self.machine = None;
        self.last_applied_sequence = 0;
        self.events.push_back(SessionEvent::InputEnabled(false));
        if self.role == Some(Role::Host) {
            self.local.score = 0;
            self.send(PeerMessage::InitConfig {
                rows: self.rows,
                cols: self.cols,
                num_players: NETWORK_PLAYERS,
                host_player: self.local.clone(),
            });
        }
    }

    // ------------------------------------------------------------------ //
    //  Local actions
    // ------------------------------------------------------------------ //

    /// Apply a move by the local player and relay it.
    pub fn local_move(&mut self, mv: Move) -> Result<(), SessionError> {
        if self.state != SessionState::Synced {
            return Err(SessionError::NotSynced);
        }
        let me = self.local.identity;
        let machine = self.machine.as_mut().ok_or(SessionError::NotSynced)?;
        if machine.board().current_player() != me {
            return Err(SessionError::NotYourTurn);
        }
        let transition = machine
            .apply_move(mv, me, false)
            .map_err(|rejection| SessionError::Rejected { rejection })?;
        let seq = machine.advance_sequence();
        tracing::debug!(seq, mover = me, kind = ?mv.kind, row = mv.row, col = mv.col, "local move relayed");
        self.send(PeerMessage::GameMove { mv, mover_identity: me, turn_sequence: seq });
        self.after_transition(transition);
        Ok(())
    }

    pub fn request_restart(&mut self) -> Result<(), SessionError> {
        if !self.in_match() {
            return Err(SessionError::NotSynced);
        }
        if self.restart_requested {
            return Err(SessionError::RestartPending);
        }
        self.restart_requested = true;
        self.send(PeerMessage::RestartRequest { requester_name: self.local.name.clone() });
        Ok(())
    }

    pub fn answer_restart(&mut self, accept: bool) -> Result<(), SessionError> {
        if !self.restart_incoming {
            return Err(SessionError::NoRestartRequest);
        }
        self.restart_incoming = false;
        if accept {
            self.send(PeerMessage::RestartAck);
            self.reset_to_setup();
        } else {
            self.send(PeerMessage::RestartNak);
        }
        Ok(())
    }

    /// Push the whole board to the joiner. Host only; returns whether a push
    /// was queued.
    pub fn resync(&mut self) -> bool {
        if self.role != Some(Role::Host) || !self.in_match() {
            return false;
        }
        self.push_full_state();
        true
    }

    // ------------------------------------------------------------------ //
    //  Inbound
    // ------------------------------------------------------------------ //

    pub fn handle_message(&mut self, msg: PeerMessage) {
        tracing::debug!(kind = msg.kind(), state = ?self.state, role = ?self.role, "inbound message");
        if !matches!(
            self.state,
            SessionState::TransportOpen
                | SessionState::Handshaking
                | SessionState::Synced
                | SessionState::SyncedGameOver
        ) {
            self.violation(msg.kind(), "no open session");
            return;
        }
        match (self.role, msg) {
            (
                Some(Role::Joiner),
                PeerMessage::InitConfig { rows, cols, num_players, host_player },
            ) => self.on_init_config(rows, cols, num_players, host_player),
            (Some(Role::Host), PeerMessage::JoinInfo { player }) => self.on_join_info(player),
            (_, PeerMessage::GameMove { mv, mover_identity, turn_sequence }) => {
                self.on_game_move(mv, mover_identity, turn_sequence)
            }
            (Some(Role::Joiner), PeerMessage::FullState(snapshot)) => self.on_full_state(snapshot),
            (_, PeerMessage::RestartRequest { requester_name }) => self.on_restart_request(requester_name),
            (_, PeerMessage::RestartAck) => self.on_restart_reply(true),
            (_, PeerMessage::RestartNak) => self.on_restart_reply(false),
            (_, other) => self.violation(other.kind(), "unexpected for this role"),
        }
    }

    fn on_init_config(&mut self, rows: usize, cols: usize, num_players: usize, host: PlayerRecord) {
        if self.state != SessionState::Handshaking {
            return self.violation("InitConfig", "not handshaking");
        }
        if num_players != NETWORK_PLAYERS || host.identity != Role::Host.identity() {
            return self.violation("InitConfig", "networked matches seat exactly two players");
        }
        let mine = resolve_collision(&host, self.local.clone());
        let host = PlayerRecord { score: 0, cpu: None, ..host };
        let board = match BoardState::pending(rows, cols, vec![host.clone(), mine.clone()]) {
            Ok(board) => board,
            Err(e) => return self.violation("InitConfig", &e.to_string()),
        };
        if mine.name != self.local.name || mine.icon != self.local.icon || mine.color != self.local.color {
            self.events.push_back(SessionEvent::Notice(format!(
                "playing as {} {} ({})",
                mine.icon, mine.name, mine.color
            )));
        }
        tracing::info!(rows, cols, host = %host.name, "match configuration received");
        self.rows = rows;
        self.cols = cols;
        self.local = mine.clone();
        self.peer = Some(host);
        self.machine = Some(TurnMachine::new(board, MatchMode::Networked));
        self.send(PeerMessage::JoinInfo { player: mine });
        self.events.push_back(SessionEvent::Redraw);
    }

    fn on_join_info(&mut self, player: PlayerRecord) {
        if self.state != SessionState::Handshaking || self.machine.is_some() {
            return self.violation("JoinInfo", "not waiting for a joiner");
        }
        if player.identity != Role::Joiner.identity() {
            return self.violation("JoinInfo", "joiner must take identity 1");
        }
        let joiner = resolve_collision(&self.local, player);
        let board = match BoardState::new(self.rows, self.cols, vec![self.local.clone(), joiner.clone()]) {
            Ok(board) => board,
            Err(e) => return self.violation("JoinInfo", &e.to_string()),
        };
        tracing::info!(joiner = %joiner.name, rows = self.rows, cols = self.cols, "match synced");
        self.peer = Some(joiner);
        self.machine = Some(TurnMachine::new(board, MatchMode::Networked));
        self.state = SessionState::Synced;
        self.push_full_state();
        self.events.push_back(SessionEvent::Redraw);
        self.events.push_back(SessionEvent::InputEnabled(self.is_my_turn()));
    }

    fn on_game_move(&mut self, mv: Move, mover: PlayerId, seq: u64) {
        if !self.in_match() {
            return self.violation("GameMove", "no match in progress");
        }
        if self.last_applied_sequence != 0 && seq <= self.last_applied_sequence {
            tracing::debug!(seq, last = self.last_applied_sequence, "stale GameMove dropped");
            return;
        }
        let Some(machine) = self.machine.as_mut() else {
            return self.violation("GameMove", "no board");
        };
        self.last_applied_sequence = seq;
        machine.observe_sequence(seq);
        match machine.apply_move(mv, mover, true) {
            Ok(transition) => {
                tracing::debug!(seq, mover, kind = ?mv.kind, row = mv.row, col = mv.col, "remote move applied");
                self.after_transition(transition);
            }
            Err(rejection) => {
                tracing::warn!(seq, mover, %rejection, "remote move rejected");
                if self.role == Some(Role::Host) {
                    self.push_full_state();
                }
            }
        }
    }

    fn on_full_state(&mut self, snapshot: FullStateSnapshot) {
        if !matches!(
            self.state,
            SessionState::Handshaking | SessionState::Synced | SessionState::SyncedGameOver
        ) {
            return self.violation("FullState", "not in a match");
        }
        let known = self.board().map_or(0, BoardState::turn_sequence);
        if snapshot.turn_sequence != 0 && snapshot.turn_sequence < known {
            tracing::debug!(snapshot = snapshot.turn_sequence, known, "stale FullState dropped");
            return;
        }
        let board = match BoardState::try_from(snapshot) {
            Ok(board) => board,
            Err(e) => return self.violation("FullState", &e.to_string()),
        };
        if board.num_players() != NETWORK_PLAYERS {
            return self.violation("FullState", "networked matches seat exactly two players");
        }
        let was_over = self.state == SessionState::SyncedGameOver;
        let players = board.players();
        self.peer = Some(players[0].clone());
        self.local = players[1].clone();
        let finished = !board.is_active() && board.filled_box_count() == board.total_boxes();
        let result = board.result();
        // Moves the snapshot already covers are stale from here on.
        self.last_applied_sequence = self.last_applied_sequence.max(board.turn_sequence());
        match self.machine.as_mut() {
            Some(machine) => machine.replace_board(board),
            None => self.machine = Some(TurnMachine::new(board, MatchMode::Networked)),
        }
        self.state = if finished { SessionState::SyncedGameOver } else { SessionState::Synced };
        tracing::debug!(state = ?self.state, "full state adopted");
        self.events.push_back(SessionEvent::Redraw);
        if finished && !was_over {
            self.events.push_back(SessionEvent::Board(Event::GameOver(result)));
        }
        self.events.push_back(SessionEvent::InputEnabled(self.is_my_turn()));
    }

    fn on_restart_request(&mut self, requester_name: String) {
        if !self.in_match() {
            return self.violation("RestartRequest", "no match in progress");
        }
        if self.restart_requested {
            // Both sides asked at once: that is agreement.
            self.restart_requested = false;
            self.send(PeerMessage::RestartAck);
            self.reset_to_setup();
            return;
        }
        self.restart_incoming = true;
        self.events.push_back(SessionEvent::RestartRequested { requester_name });
    }

    fn on_restart_reply(&mut self, accepted: bool) {
        let kind = if accepted { "RestartAck" } else { "RestartNak" };
        if !self.restart_requested {
            return self.violation(kind, "no rematch was requested");
        }
        self.restart_requested = false;
        if accepted {
            self.reset_to_setup();
        } else {
            self.events.push_back(SessionEvent::RestartDeclined);
        }
    }

    // ------------------------------------------------------------------ //
    //  Helpers
    // ------------------------------------------------------------------ //

    fn in_match(&self) -> bool {
        matches!(self.state, SessionState::Synced | SessionState::SyncedGameOver)
    }

    fn send(&mut self, msg: PeerMessage) {
        self.outbound.push_back(msg);
    }

    fn push_full_state(&mut self) {
        if let Some(board) = self.board() {
            let snapshot = FullStateSnapshot::from(board);
            tracing::debug!(seq = snapshot.turn_sequence, "pushing full state");
            self.send(PeerMessage::FullState(snapshot));
        }
    }

    fn after_transition(&mut self, transition: TransitionResult) {
        for event in transition.events {
            self.events.push_back(SessionEvent::Board(event));
        }
        if transition.game_over.is_some() {
            self.state = SessionState::SyncedGameOver;
        }
        self.events.push_back(SessionEvent::InputEnabled(self.is_my_turn()));
    }

    /// Both sides drop their board; the host reopens the handshake.
    fn reset_to_setup(&mut self) {
        self.restart_incoming = false;
        self.restart_requested = false;
        tracing::info!(role = ?self.role, "rematch agreed, back to setup");
        self.events.push_back(SessionEvent::Restarted);
        self.begin_handshake();
    }

    fn violation(&self, kind: &str, why: &str) {
        tracing::warn!(kind, role = ?self.role, state = ?self.state, why, "protocol violation, message ignored");
    }
}
