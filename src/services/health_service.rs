use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode, logging a failing storage ping.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.game_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded(), state.players().len())
}
