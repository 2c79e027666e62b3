use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{AdminGameView, PhaseActionResponse, ResetScoresResponse, SettingsUpdateRequest},
        common::SettingsView,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints driving the game.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/game", get(get_game))
        .route("/admin/settings", put(update_settings))
        .route("/admin/game/registration", post(open_registration))
        .route("/admin/game/start", post(start_game))
        .route("/admin/game/settle", post(settle_round))
        .route("/admin/game/next-round", post(next_round))
        .route("/admin/game/reset", post(reset_game))
        .route("/admin/game/reset-scores", post(reset_scores))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Full game state including balances, votes and pot breakdown.
#[utoipa::path(
    get,
    path = "/admin/game",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Admin view of the game", body = AdminGameView))
)]
pub async fn get_game(State(state): State<SharedState>) -> Json<AdminGameView> {
    Json(admin_service::game_view(&state))
}

/// Change settings. Team count, starting points and multiplier only during setup.
#[utoipa::path(
    put,
    path = "/admin/settings",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SettingsUpdateRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsView),
        (status = 400, description = "Invalid value"),
        (status = 409, description = "Setting locked in the current phase")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SettingsUpdateRequest>>,
) -> Result<Json<SettingsView>, AppError> {
    Ok(Json(admin_service::update_settings(&state, payload).await?))
}

/// Let players join teams.
#[utoipa::path(
    post,
    path = "/admin/game/registration",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Registration opened", body = PhaseActionResponse),
        (status = 409, description = "Not in setup")
    )
)]
pub async fn open_registration(
    State(state): State<SharedState>,
) -> Result<Json<PhaseActionResponse>, AppError> {
    Ok(Json(admin_service::open_registration(&state).await?))
}

/// Start the first voting round.
#[utoipa::path(
    post,
    path = "/admin/game/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Voting started", body = PhaseActionResponse),
        (status = 409, description = "Not in registration")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
) -> Result<Json<PhaseActionResponse>, AppError> {
    Ok(Json(admin_service::start_game(&state).await?))
}

/// Close voting and settle the round.
#[utoipa::path(
    post,
    path = "/admin/game/settle",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round settled", body = PhaseActionResponse),
        (status = 409, description = "Not voting")
    )
)]
pub async fn settle_round(
    State(state): State<SharedState>,
) -> Result<Json<PhaseActionResponse>, AppError> {
    Ok(Json(admin_service::settle_round(&state).await?))
}

/// Open the next voting round.
#[utoipa::path(
    post,
    path = "/admin/game/next-round",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Next round started", body = PhaseActionResponse),
        (status = 409, description = "Not showing results")
    )
)]
pub async fn next_round(
    State(state): State<SharedState>,
) -> Result<Json<PhaseActionResponse>, AppError> {
    Ok(Json(admin_service::next_round(&state).await?))
}

/// Wipe players and restore default settings.
#[utoipa::path(
    post,
    path = "/admin/game/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Game reset", body = PhaseActionResponse))
)]
pub async fn reset_game(
    State(state): State<SharedState>,
) -> Result<Json<PhaseActionResponse>, AppError> {
    Ok(Json(admin_service::reset_game(&state).await?))
}

/// Put every player back to the starting balance.
#[utoipa::path(
    post,
    path = "/admin/game/reset-scores",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Scores reset", body = ResetScoresResponse))
)]
pub async fn reset_scores(
    State(state): State<SharedState>,
) -> Result<Json<ResetScoresResponse>, AppError> {
    Ok(Json(admin_service::reset_scores(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
