use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::player::{
        ContributionRequest, ContributionResponse, PlayerView, RegisterRequest, RegisterResponse,
    },
    error::AppError,
    services::player_service,
    state::{SharedState, game::PlayerId},
};

/// Endpoints used by player devices.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(register))
        .route("/players/{id}", get(get_player))
        .route("/players/{id}/contribution", post(submit_contribution))
}

#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Player registered", body = RegisterResponse),
        (status = 400, description = "Invalid name or team"),
        (status = 409, description = "Registration not open")
    )
)]
/// Join a team and receive a player id.
pub async fn register(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<Json<RegisterResponse>, AppError> {
    Ok(Json(player_service::register(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = String, Path, description = "Player id returned at registration")),
    responses(
        (status = 200, description = "Player state", body = PlayerView),
        (status = 404, description = "Unknown player; register again")
    )
)]
/// Look up a stored player id.
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(player_service::get_player(
        &state,
        &PlayerId::from(id),
    )?))
}

#[utoipa::path(
    post,
    path = "/players/{id}/contribution",
    tag = "players",
    params(("id" = String, Path, description = "Player id returned at registration")),
    request_body = ContributionRequest,
    responses(
        (status = 200, description = "Contribution stored", body = ContributionResponse),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "Not voting")
    )
)]
/// Submit or overwrite this round's contribution.
pub async fn submit_contribution(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<ContributionRequest>,
) -> Result<Json<ContributionResponse>, AppError> {
    Ok(Json(
        player_service::submit_contribution(&state, PlayerId::from(id), payload.amount).await?,
    ))
}
