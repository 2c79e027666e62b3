use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Persisted phase name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEntity {
    Setup,
    Registration,
    Voting,
    Results,
}

/// Persisted submission state of a player.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatusEntity {
    #[default]
    Pending,
    Submitted,
    Settled,
}

/// Settings as stored alongside the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SettingsEntity {
    pub num_teams: u32,
    pub initial_points: f64,
    pub multiplier: f64,
    pub hide_points: bool,
}

/// One player slot, stored under `players.<id>` so it can be written on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    pub name: String,
    pub team: u32,
    pub points: f64,
    pub current_vote: Option<f64>,
    pub last_round_change: Option<f64>,
    #[serde(default)]
    pub vote_status: VoteStatusEntity,
}

/// The whole shared game record as persisted by every backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntity {
    pub phase: PhaseEntity,
    pub settings: SettingsEntity,
    /// Players keyed by their identifier.
    #[serde(default)]
    pub players: BTreeMap<String, PlayerEntity>,
    pub current_round: u32,
    /// Raw team pots keyed by the team number rendered as a string.
    #[serde(default)]
    pub team_pots: BTreeMap<String, f64>,
    /// Member counts at settlement, keyed like `team_pots`.
    #[serde(default)]
    pub settled_team_sizes: BTreeMap<String, usize>,
    pub updated_at: SystemTime,
}
