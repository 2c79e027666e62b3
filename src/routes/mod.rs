use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod admin;
pub mod health;
pub mod player;
pub mod public;
pub mod sse;
pub mod websocket;

/// Compose all route trees, wiring in shared state and the Swagger UI.
pub fn router(state: SharedState) -> Router<()> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(public::router())
        .merge(player::router())
        .merge(admin::router(state.clone()))
        .merge(swagger)
        .with_state(state)
}
