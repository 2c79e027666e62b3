use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{Settings, VoteStatus};

/// Game settings as exposed to every client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsView {
    pub num_teams: u32,
    pub initial_points: f64,
    pub multiplier: f64,
    pub hide_points: bool,
}

impl From<Settings> for SettingsView {
    fn from(value: Settings) -> Self {
        Self {
            num_teams: value.num_teams,
            initial_points: value.initial_points,
            multiplier: value.multiplier,
            hide_points: value.hide_points,
        }
    }
}

/// Where a player stands in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatusDto {
    Pending,
    Submitted,
    Settled,
}

impl From<VoteStatus> for VoteStatusDto {
    fn from(value: VoteStatus) -> Self {
        match value {
            VoteStatus::Pending => Self::Pending,
            VoteStatus::Submitted => Self::Submitted,
            VoteStatus::Settled => Self::Settled,
        }
    }
}

/// One-decimal label for a balance. Display only; stored values are never rounded.
pub fn format_points(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    // avoid "-0.0"
    if rounded == 0.0 {
        return "0.0".into();
    }
    format!("{rounded:.1}")
}

/// Like [`format_points`], with an explicit `+` on gains.
pub fn format_change(value: f64) -> String {
    let label = format_points(value);
    if label != "0.0" && value > 0.0 {
        format!("+{label}")
    } else {
        label
    }
}
