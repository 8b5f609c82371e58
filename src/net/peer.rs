//! Async driver for one networked match.
//!
//! Serializes local commands, inbound messages and the periodic resync tick
//! onto a single [`PeerSession`], then flushes its outbound messages to the
//! wire and its events to the presentation.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::engine::models::Move;
use crate::engine::presentation::{dispatch, Presentation};
use crate::net::session::{PeerSession, SessionEvent, SessionState};
use crate::net::transport::{Connection, MessageSink};

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// How often the host pushes a full snapshot. `None` disables the timer.
    pub resync_interval: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self { resync_interval: Some(Duration::from_secs(15)) }
    }
}

/// Local intents for a networked match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    Move(Move),
    RequestRestart,
    AnswerRestart(bool),
    Leave,
}

/// Run the match over `conn` until either side leaves or the link drops.
/// The session must not have opened a transport yet. Without a role it takes
/// the one implied by the connection direction.
pub async fn run_peer<P: Presentation>(
    mut session: PeerSession,
    conn: Connection,
    ui: &mut P,
    mut commands: mpsc::UnboundedReceiver<PeerCommand>,
    config: PeerConfig,
) -> PeerSession {
    match session.role() {
        None => session.assign_role(conn.role()),
        Some(role) if role != conn.role() => {
            tracing::warn!(%role, link = %conn.role(), "session role disagrees with the link direction")
        }
        Some(_) => {}
    }
    let (sink, mut inbound) = conn.into_parts();
    session.transport_opened();
    flush(&mut session, &sink, ui);

    let mut resync = config.resync_interval.map(|period| {
        let mut timer: Interval = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    while session.state() != SessionState::Disconnected {
        tokio::select! {
            msg = inbound.next() => match msg {
                Some(Ok(msg)) => session.handle_message(msg),
                Some(Err(e)) if !e.is_fatal() => tracing::warn!(error = %e, "unreadable message ignored"),
                Some(Err(e)) => session.transport_error(&e.to_string()),
                None => session.transport_closed(),
            },
            cmd = commands.recv() => match cmd {
                Some(PeerCommand::Move(mv)) => {
                    if let Err(e) = session.local_move(mv) {
                        ui.show_message(&e.to_string());
                    }
                }
                Some(PeerCommand::RequestRestart) => match session.request_restart() {
                    Ok(()) => ui.show_message("rematch requested"),
                    Err(e) => ui.show_message(&e.to_string()),
                },
                Some(PeerCommand::AnswerRestart(accept)) => {
                    if let Err(e) = session.answer_restart(accept) {
                        ui.show_message(&e.to_string());
                    }
                }
                Some(PeerCommand::Leave) | None => session.leave(),
            },
            _ = tick(&mut resync) => {
                session.resync();
            }
        }
        flush(&mut session, &sink, ui);
    }

    sink.finish().await;
    session
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn flush<P: Presentation>(session: &mut PeerSession, sink: &MessageSink, ui: &mut P) {
    for msg in session.take_outbound() {
        let kind = msg.kind();
        if !sink.send(msg) {
            tracing::warn!(kind, "writer gone, message dropped");
        }
    }
    for event in session.take_events() {
        present(event, session, ui);
    }
}

fn present<P: Presentation>(event: SessionEvent, session: &PeerSession, ui: &mut P) {
    match event {
        SessionEvent::Board(event) => dispatch(std::slice::from_ref(&event), ui),
        SessionEvent::Redraw => {
            if let Some(board) = session.board() {
                ui.redraw(board);
            }
        }
        SessionEvent::InputEnabled(enabled) => ui.set_input_enabled(enabled),
        SessionEvent::Notice(text) => ui.show_message(&text),
        SessionEvent::RestartRequested { requester_name } => {
            ui.show_message(&format!("{requester_name} wants a rematch (yes/no)"))
        }
        SessionEvent::RestartDeclined => ui.show_message("rematch declined"),
        SessionEvent::Restarted => ui.show_message("starting a new match"),
        SessionEvent::Disconnected { reason } => ui.show_message(&reason),
    }
}
