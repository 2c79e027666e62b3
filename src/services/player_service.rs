//! Player-facing operations shared by the REST routes and the WebSocket loop.

use crate::{
    dto::player::{ContributionResponse, PlayerView, RegisterRequest, RegisterResponse},
    error::ServiceError,
    state::{SharedState, game::PlayerId},
};

/// Join a team. The returned id is the player's only credential.
pub async fn register(
    state: &SharedState,
    request: RegisterRequest,
) -> Result<RegisterResponse, ServiceError> {
    let registration = state.register(request.name, request.team).await?;
    let player = view_of(state, &registration.player_id)?;
    Ok(RegisterResponse {
        player_id: registration.player_id.to_string(),
        player,
    })
}

/// Own view of a registered player; 404 tells the client to register again.
pub fn get_player(state: &SharedState, player_id: &PlayerId) -> Result<PlayerView, ServiceError> {
    view_of(state, player_id)
}

/// Submit (or overwrite) this round's contribution.
pub async fn submit_contribution(
    state: &SharedState,
    player_id: PlayerId,
    amount: f64,
) -> Result<ContributionResponse, ServiceError> {
    let receipt = state.submit_contribution(player_id, amount).await?;
    let player = view_of(state, &receipt.player_id)?;
    Ok(ContributionResponse::new(&receipt, player))
}

fn view_of(state: &SharedState, player_id: &PlayerId) -> Result<PlayerView, ServiceError> {
    PlayerView::from_record(&state.game(), player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))
}
