//! DTO definitions used by the admin REST API and the admin SSE stream.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        common::{SettingsView, VoteStatusDto, format_change, format_points},
        format_system_time,
        phase::VisibleGamePhase,
    },
    state::{
        game::{GameRecord, PlayerId, SettingsUpdate},
        state_machine::GamePhase,
    },
};

/// Partial settings update. Only `hide_points` may change outside setup.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct SettingsUpdateRequest {
    #[validate(range(min = 1))]
    pub num_teams: Option<u32>,
    #[validate(range(min = 0.0))]
    pub initial_points: Option<f64>,
    #[validate(range(min = 0.0))]
    pub multiplier: Option<f64>,
    pub hide_points: Option<bool>,
}

impl From<SettingsUpdateRequest> for SettingsUpdate {
    fn from(value: SettingsUpdateRequest) -> Self {
        Self {
            num_teams: value.num_teams,
            initial_points: value.initial_points,
            multiplier: value.multiplier,
            hide_points: value.hide_points,
        }
    }
}

/// Result of a phase transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseActionResponse {
    pub phase: VisibleGamePhase,
    pub round: u32,
}

/// Result of a score reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetScoresResponse {
    pub players_reset: usize,
}

/// Everything the admin console shows.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminGameView {
    pub phase: VisibleGamePhase,
    pub round: u32,
    pub settings: SettingsView,
    pub degraded: bool,
    pub submitted: usize,
    pub players_total: usize,
    pub teams: Vec<AdminTeamView>,
    /// RFC 3339 time of the last commit.
    pub updated_at: String,
}

/// Per-team breakdown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminTeamView {
    pub team: u32,
    pub submitted: usize,
    pub members: Vec<AdminPlayerView>,
    /// Raw pot of the settled round; results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplied_pot: Option<f64>,
    /// What each member received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_label: Option<String>,
}

/// A player with every field, including the pending vote.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminPlayerView {
    pub player_id: String,
    pub name: String,
    pub points: f64,
    pub points_label: String,
    pub vote_status: VoteStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_vote: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round_change_label: Option<String>,
    /// A WebSocket is open for this player.
    pub connected: bool,
}

impl AdminGameView {
    /// Project `record`; `connected` tells which players hold a live socket.
    pub fn from_record(
        record: &GameRecord,
        connected: impl Fn(&PlayerId) -> bool,
        degraded: bool,
    ) -> Self {
        let multiplier = record.settings.multiplier;
        let in_results = record.phase == GamePhase::Results;

        let teams = (1..=record.settings.num_teams)
            .map(|team| {
                let members: Vec<AdminPlayerView> = record
                    .team_members(team)
                    .map(|(id, player)| AdminPlayerView {
                        player_id: id.to_string(),
                        name: player.name.clone(),
                        points: player.points,
                        points_label: format_points(player.points),
                        vote_status: player.vote_status.into(),
                        current_vote: player.current_vote,
                        last_round_change: player.last_round_change,
                        last_round_change_label: player.last_round_change.map(format_change),
                        connected: connected(id),
                    })
                    .collect();
                let submitted = record
                    .team_members(team)
                    .filter(|(_, player)| player.has_submitted())
                    .count();

                let pot = in_results.then(|| record.team_pots.get(&team).copied().unwrap_or(0.0));
                let multiplied_pot = pot.map(|pot| pot * multiplier);
                // split across the members present at settlement
                let share = multiplied_pot.and_then(|multiplied| {
                    record
                        .settled_team_sizes
                        .get(&team)
                        .filter(|size| **size > 0)
                        .map(|size| multiplied / *size as f64)
                });

                AdminTeamView {
                    team,
                    submitted,
                    members,
                    pot,
                    multiplied_pot,
                    share,
                    share_label: share.map(format_points),
                }
            })
            .collect();

        Self {
            phase: record.phase.into(),
            round: record.current_round,
            settings: record.settings.into(),
            degraded,
            submitted: record.submitted_count(),
            players_total: record.players.len(),
            teams,
            updated_at: format_system_time(record.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Player, Settings};

    #[test]
    fn results_breakdown_divides_multiplied_pot() {
        let mut record = GameRecord::new(Settings::default());
        record.phase = GamePhase::Results;
        record
            .players
            .insert(PlayerId::from("1"), Player::new("Ada".into(), 1, 10.0));
        record
            .players
            .insert(PlayerId::from("2"), Player::new("Bob".into(), 1, 10.0));
        record.team_pots.insert(1, 3.0);
        record.settled_team_sizes.insert(1, 2);

        let view = AdminGameView::from_record(&record, |id| id.as_str() == "2", false);
        let team = &view.teams[0];
        assert_eq!(team.pot, Some(3.0));
        assert_eq!(team.multiplied_pot, Some(6.0));
        assert_eq!(team.share, Some(3.0));
        assert!(!team.members[0].connected);
        assert!(team.members[1].connected);
        assert_eq!(view.teams[1].share, None);
    }

    #[test]
    fn late_joiner_does_not_dilute_the_paid_share() {
        let mut record = GameRecord::new(Settings::default());
        record.phase = GamePhase::Results;
        record
            .players
            .insert(PlayerId::from("1"), Player::new("Ada".into(), 1, 16.0));
        record.team_pots.insert(1, 6.0);
        record.settled_team_sizes.insert(1, 1);
        record
            .players
            .insert(PlayerId::from("2"), Player::new("Late".into(), 1, 20.0));

        let view = AdminGameView::from_record(&record, |_| false, false);
        assert_eq!(view.teams[0].members.len(), 2);
        assert_eq!(view.teams[0].share, Some(12.0));
    }

    #[test]
    fn settings_request_rejects_negative_multiplier() {
        let request = SettingsUpdateRequest {
            multiplier: Some(-1.0),
            ..Default::default()
        };
        assert!(request.validate().is_err());
        let request = SettingsUpdateRequest {
            num_teams: Some(0),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
