//! Service helpers that expose read-only public projections of the game.

use crate::{
    dto::public::{GamePhaseResponse, PublicGameView},
    services::sse_events,
    state::SharedState,
};

/// Projector view of the whole game.
pub fn get_game(state: &SharedState) -> PublicGameView {
    sse_events::public_view(state, &state.game())
}

/// Return the current phase, round and degraded mode.
pub fn get_game_phase(state: &SharedState) -> GamePhaseResponse {
    let game = state.game();
    GamePhaseResponse {
        phase: game.phase.into(),
        round: game.current_round,
        degraded: state.is_degraded(),
    }
}
