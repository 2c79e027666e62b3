use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{
        common::{SettingsView, format_points},
        format_system_time,
        phase::VisibleGamePhase,
    },
    state::{game::GameRecord, state_machine::GamePhase},
};

/// Shared projection shown on the projector: no ids, no votes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicGameView {
    pub phase: VisibleGamePhase,
    pub round: u32,
    pub settings: SettingsView,
    pub degraded: bool,
    /// How many players already submitted this round.
    pub submitted: usize,
    pub players_total: usize,
    /// One entry per team, `1..=num_teams`, empty teams included.
    pub teams: Vec<PublicTeamView>,
    /// RFC 3339 time of the last commit.
    pub updated_at: String,
}

/// A team column of the public board.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicTeamView {
    pub team: u32,
    pub members: Vec<PublicMemberView>,
    /// Raw pot, present in results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_label: Option<String>,
}

/// A player as seen by everyone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicMemberView {
    pub name: String,
    /// Omitted while points are hidden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_label: Option<String>,
    pub submitted: bool,
}

impl PublicGameView {
    /// Project `record`, honouring `hide_points`.
    pub fn from_record(record: &GameRecord, degraded: bool) -> Self {
        let hide_points = record.settings.hide_points;
        let in_results = record.phase == GamePhase::Results;

        let teams = (1..=record.settings.num_teams)
            .map(|team| {
                let members = record
                    .team_members(team)
                    .map(|(_, player)| {
                        let points = (!hide_points).then_some(player.points);
                        PublicMemberView {
                            name: player.name.clone(),
                            points,
                            points_label: points.map(format_points),
                            submitted: player.has_submitted(),
                        }
                    })
                    .collect();
                let pot = in_results.then(|| record.team_pots.get(&team).copied().unwrap_or(0.0));
                PublicTeamView {
                    team,
                    members,
                    pot,
                    pot_label: pot.map(format_points),
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

/// Response exposing the game's phase as seen by the public.
#[derive(Debug, Serialize, ToSchema)]
pub struct GamePhaseResponse {
    pub phase: VisibleGamePhase,
    pub round: u32,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Player, PlayerId, Settings};

    fn record() -> GameRecord {
        let mut record = GameRecord::new(Settings::default());
        record.phase = GamePhase::Results;
        record
            .players
            .insert(PlayerId::from("1"), Player::new("Ada".into(), 1, 12.34));
        record.team_pots.insert(1, 4.0);
        record
    }

    #[test]
    fn hidden_points_are_omitted() {
        let mut record = record();
        record.settings.hide_points = true;
        let view = PublicGameView::from_record(&record, false);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["teams"][0]["members"][0].get("points").is_none());
        assert_eq!(json["teams"][0]["members"][0]["name"], "Ada");
    }

    #[test]
    fn every_team_has_a_column_and_pots_show_in_results() {
        let view = PublicGameView::from_record(&record(), false);
        assert_eq!(view.teams.len(), 3);
        assert_eq!(view.teams[0].pot, Some(4.0));
        assert_eq!(view.teams[2].pot, Some(0.0));
        assert_eq!(view.teams[0].members[0].points_label.as_deref(), Some("12.3"));
    }
}
