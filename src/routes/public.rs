use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::{GamePhaseResponse, PublicGameView},
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints that expose the current game state.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/game", get(get_game))
        .route("/public/phase", get(get_game_phase))
}

#[utoipa::path(
    get,
    path = "/public/game",
    tag = "public",
    responses((status = 200, description = "Projector view of the game", body = PublicGameView))
)]
/// Return the teams, members and pots as shown on the shared screen.
pub async fn get_game(State(state): State<SharedState>) -> Json<PublicGameView> {
    Json(public_service::get_game(&state))
}

#[utoipa::path(
    get,
    path = "/public/phase",
    tag = "public",
    responses((status = 200, description = "Current game phase", body = GamePhaseResponse))
)]
/// Return the phase and round the game is currently in.
pub async fn get_game_phase(State(state): State<SharedState>) -> Json<GamePhaseResponse> {
    Json(public_service::get_game_phase(&state))
}
