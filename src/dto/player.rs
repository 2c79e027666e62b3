//! Payloads for the player-facing REST routes and WebSocket pushes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        common::{VoteStatusDto, format_change, format_points},
        phase::VisibleGamePhase,
        validation::validate_player_name,
    },
    state::{
        engine::ContributionReceipt,
        game::{GameRecord, PlayerId, VoteTransition},
        state_machine::GamePhase,
    },
};

/// Request body for joining a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
    /// Team number, `1..=num_teams`.
    #[validate(range(min = 1))]
    pub team: u32,
}

/// Returned once; the client keeps the id to reconnect.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub player_id: String,
    pub player: PlayerView,
}

/// Request body for submitting a contribution. Out-of-range values are clamped.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ContributionRequest {
    pub amount: f64,
}

/// What was actually stored for a contribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContributionResponse {
    pub requested: f64,
    pub stored: f64,
    /// True when a previous contribution of the same round was replaced.
    pub overwritten: bool,
    pub player: PlayerView,
}

/// A player's own screen.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerView {
    pub player_id: String,
    pub name: String,
    pub team: u32,
    /// Always visible to the player, whatever `hide_points` says.
    pub points: f64,
    pub points_label: String,
    pub vote_status: VoteStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_vote: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round_change_label: Option<String>,
    /// Highest accepted contribution, the whole part of `points`.
    pub max_contribution: f64,
    pub can_contribute: bool,
    pub round: u32,
    pub phase: VisibleGamePhase,
}

impl PlayerView {
    /// Project `player_id`'s slot of `record`; `None` when the id is unknown.
    pub fn from_record(record: &GameRecord, player_id: &PlayerId) -> Option<Self> {
        let player = record.players.get(player_id)?;
        Some(Self {
            player_id: player_id.to_string(),
            name: player.name.clone(),
            team: player.team,
            points: player.points,
            points_label: format_points(player.points),
            vote_status: player.vote_status.into(),
            current_vote: player.current_vote,
            last_round_change: player.last_round_change,
            last_round_change_label: player.last_round_change.map(format_change),
            max_contribution: player.points.max(0.0).floor(),
            can_contribute: record.phase == GamePhase::Voting && !player.has_submitted(),
            round: record.current_round,
            phase: record.phase.into(),
        })
    }
}

impl ContributionResponse {
    /// Combine the engine receipt with the committed record.
    pub fn new(receipt: &ContributionReceipt, player: PlayerView) -> Self {
        Self {
            requested: receipt.requested,
            stored: receipt.stored,
            overwritten: matches!(receipt.transition, VoteTransition::Overwritten { .. }),
            player,
        }
    }
}
