use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::player::PlayerView;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Must be the first frame; binds the socket to a registered player.
    Identification { player_id: String },
    /// Submit or overwrite this round's contribution.
    Contribute { amount: f64 },
    #[serde(other)]
    Unknown,
}

impl PlayerInboundMessage {
    /// Decode a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Positive acknowledgement after identification.
    Ack { player_id: String },
    /// Full player screen, sent after identification and on every change.
    PlayerState { player: PlayerView },
    /// Reply to a `contribute` frame.
    ContributionAccepted {
        requested: f64,
        stored: f64,
        overwritten: bool,
    },
    /// A request was rejected; the socket stays open unless stated otherwise.
    Error { message: String },
}
