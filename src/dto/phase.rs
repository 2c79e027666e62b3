use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::GamePhase;

/// Game phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleGamePhase {
    /// Admin is configuring the game.
    Setup,
    /// Players can join teams.
    Registration,
    /// Players submit contributions.
    Voting,
    /// The last round has been settled.
    Results,
}

impl From<GamePhase> for VisibleGamePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Setup => VisibleGamePhase::Setup,
            GamePhase::Registration => VisibleGamePhase::Registration,
            GamePhase::Voting => VisibleGamePhase::Voting,
            GamePhase::Results => VisibleGamePhase::Results,
        }
    }
}
