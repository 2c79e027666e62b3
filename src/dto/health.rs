use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Player sockets currently connected.
    pub connected_players: usize,
}

impl HealthResponse {
    /// Create a health response for the given degraded flag.
    pub fn new(degraded: bool, connected_players: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            connected_players,
        }
    }
}
