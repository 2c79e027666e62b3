use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Pot Share backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::get_game,
        crate::routes::public::get_game_phase,
        crate::routes::player::register,
        crate::routes::player::get_player,
        crate::routes::player::submit_contribution,
        crate::routes::admin::get_game,
        crate::routes::admin::update_settings,
        crate::routes::admin::open_registration,
        crate::routes::admin::start_game,
        crate::routes::admin::settle_round,
        crate::routes::admin::next_round,
        crate::routes::admin::reset_game,
        crate::routes::admin::reset_scores,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::public::PublicGameView,
            crate::dto::admin::AdminGameView,
            crate::dto::player::PlayerView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Read-only views for the shared screen"),
        (name = "players", description = "Registration and contributions"),
        (name = "admin", description = "Game control, requires the admin token"),
    )
)]
pub struct ApiDoc;
