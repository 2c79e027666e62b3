use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        admin::AdminGameView,
        public::PublicGameView,
        sse::{PhaseChangedEvent, ServerEvent, SystemStatus},
    },
    state::{AppState, game::GameRecord},
};

pub const EVENT_HANDSHAKE: &str = "handshake";
pub const EVENT_GAME_UPDATED: &str = "game.updated";
pub const EVENT_PHASE_CHANGED: &str = "phase_changed";
pub const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Public projection of `record` with the live degraded flag.
pub fn public_view(state: &AppState, record: &GameRecord) -> PublicGameView {
    PublicGameView::from_record(record, state.is_degraded())
}

/// Admin projection of `record`, flagging players with an open socket.
pub fn admin_view(state: &AppState, record: &GameRecord) -> AdminGameView {
    AdminGameView::from_record(
        record,
        |id| state.players().contains_key(id),
        state.is_degraded(),
    )
}

/// Push the committed record to both streams.
pub fn broadcast_game_updated(state: &AppState, record: &GameRecord) {
    send_public_event(state, EVENT_GAME_UPDATED, &public_view(state, record));
    // the admin projection is only worth building when someone listens
    if state.admin_sse().subscriber_count() > 0 {
        send_admin_event(state, EVENT_GAME_UPDATED, &admin_view(state, record));
    }
}

/// Broadcast a phase change notification.
pub fn broadcast_phase_changed(state: &AppState, record: &GameRecord) {
    let payload = PhaseChangedEvent {
        phase: record.phase.into(),
        round: record.current_round,
    };
    send_public_event(state, EVENT_PHASE_CHANGED, &payload);
    send_admin_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast the degraded flag.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Serialize `payload` as a named event; failures are logged and yield `None`.
pub fn named_event(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}

fn send_public_event(state: &AppState, event: &str, payload: &impl Serialize) {
    if let Some(event) = named_event(event, payload) {
        state.public_sse().broadcast(event);
    }
}

fn send_admin_event(state: &AppState, event: &str, payload: &impl Serialize) {
    if let Some(event) = named_event(event, payload) {
        state.admin_sse().broadcast(event);
    }
}
