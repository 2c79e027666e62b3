use std::{
    collections::BTreeMap,
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dao::models::{GameEntity, PhaseEntity, PlayerEntity, SettingsEntity, VoteStatusEntity},
    state::state_machine::GamePhase,
};

/// Team index, in `1..=num_teams`.
pub type TeamId = u32;

/// Server-issued, timestamp-derived player identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Build an identifier from a millisecond timestamp.
    pub fn from_millis(millis: u128) -> Self {
        Self(millis.to_string())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Admin-tunable game settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Number of teams players can join.
    pub num_teams: u32,
    /// Balance every fresh (or score-reset) player starts with.
    pub initial_points: f64,
    /// Factor applied to a team pot before it is shared.
    pub multiplier: f64,
    /// Hide balances on the shared (projected) views.
    pub hide_points: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_teams: 3,
            initial_points: 20.0,
            multiplier: 2.0,
            hide_points: false,
        }
    }
}

/// Where a player stands in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// Nothing submitted yet this round.
    Pending,
    /// A contribution is waiting for settlement.
    Submitted,
    /// The round has been settled; waiting for the next one.
    Settled,
}

/// Outcome of recording a contribution, kept explicit so overwrites are visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoteTransition {
    /// First contribution of the round.
    Submitted,
    /// A previous contribution of the same round was replaced.
    Overwritten {
        /// The vote that got replaced.
        previous: f64,
    },
}

/// A registered participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Display name, duplicates allowed.
    pub name: String,
    /// Team the player belongs to.
    pub team: TeamId,
    /// Current balance. Fractional values are kept as-is.
    pub points: f64,
    /// Pending contribution for the current round.
    pub current_vote: Option<f64>,
    /// Net delta applied by the last settlement.
    pub last_round_change: Option<f64>,
    /// Explicit submission state, mirrors `current_vote`.
    pub vote_status: VoteStatus,
}

impl Player {
    /// Fresh player holding the initial balance.
    pub fn new(name: String, team: TeamId, initial_points: f64) -> Self {
        Self {
            name,
            team,
            points: initial_points,
            current_vote: None,
            last_round_change: None,
            vote_status: VoteStatus::Pending,
        }
    }

    /// Whether a contribution is stored for this round.
    pub fn has_submitted(&self) -> bool {
        matches!(self.vote_status, VoteStatus::Submitted)
    }

    /// Record a contribution. Resubmission replaces the previous value.
    pub fn submit(&mut self, amount: f64) -> VoteTransition {
        let transition = match (self.vote_status, self.current_vote) {
            (VoteStatus::Submitted, Some(previous)) => VoteTransition::Overwritten { previous },
            _ => VoteTransition::Submitted,
        };
        self.current_vote = Some(amount);
        self.vote_status = VoteStatus::Submitted;
        transition
    }

    /// Back to the starting balance with no round history.
    pub fn reset_score(&mut self, initial_points: f64) {
        self.points = initial_points;
        self.current_vote = None;
        self.last_round_change = None;
        self.vote_status = VoteStatus::Pending;
    }
}

/// The single shared game record.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// Phase the game is in.
    pub phase: GamePhase,
    /// Current settings.
    pub settings: Settings,
    /// Registered players keyed by id.
    pub players: IndexMap<PlayerId, Player>,
    /// Round counter, starts at 1.
    pub current_round: u32,
    /// Raw pots of the last settled round, empty outside `results`.
    pub team_pots: BTreeMap<TeamId, f64>,
    /// Members each pot was split across at settlement. Late joiners do not
    /// change the share already paid.
    pub settled_team_sizes: BTreeMap<TeamId, usize>,
    /// Last time the record was committed.
    pub updated_at: SystemTime,
}

impl GameRecord {
    /// Empty record in `setup` with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            phase: GamePhase::Setup,
            settings,
            players: IndexMap::new(),
            current_round: 1,
            team_pots: BTreeMap::new(),
            settled_team_sizes: BTreeMap::new(),
            updated_at: SystemTime::now(),
        }
    }

    /// Wholesale reset: back to setup with default settings and no players.
    pub fn reset(&mut self, defaults: Settings) {
        *self = Self::new(defaults);
    }

    /// Players of `team`, in registration order.
    pub fn team_members(&self, team: TeamId) -> impl Iterator<Item = (&PlayerId, &Player)> {
        self.players
            .iter()
            .filter(move |(_, player)| player.team == team)
    }

    /// How many players have a contribution pending settlement.
    pub fn submitted_count(&self) -> usize {
        self.players.values().filter(|p| p.has_submitted()).count()
    }

    /// Allocate an id derived from `now`, bumped past any id already taken.
    pub fn next_player_id(&self, now: SystemTime) -> PlayerId {
        let mut millis = now
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        loop {
            let candidate = PlayerId::from_millis(millis);
            if !self.players.contains_key(&candidate) {
                return candidate;
            }
            debug!(id = %candidate, "player id already taken; bumping");
            millis += 1;
        }
    }

    /// Mark the record as changed.
    pub fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

/// Partial settings update; `None` leaves the field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsUpdate {
    pub num_teams: Option<u32>,
    pub initial_points: Option<f64>,
    pub multiplier: Option<f64>,
    pub hide_points: Option<bool>,
}

impl SettingsUpdate {
    /// Whether the update touches anything besides `hide_points`.
    pub fn changes_game_rules(&self) -> bool {
        self.num_teams.is_some() || self.initial_points.is_some() || self.multiplier.is_some()
    }

    /// Apply onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(num_teams) = self.num_teams {
            settings.num_teams = num_teams;
        }
        if let Some(initial_points) = self.initial_points {
            settings.initial_points = initial_points;
        }
        if let Some(multiplier) = self.multiplier {
            settings.multiplier = multiplier;
        }
        if let Some(hide_points) = self.hide_points {
            settings.hide_points = hide_points;
        }
    }
}

/// Coerce a requested contribution into `[0, floor(points)]`.
///
/// Non-finite input counts as zero and fractions are truncated, matching the
/// whole-point slider players use.
pub fn clamp_contribution(requested: f64, points: f64) -> f64 {
    if !requested.is_finite() {
        return 0.0;
    }
    let ceiling = points.max(0.0).floor();
    requested.trunc().clamp(0.0, ceiling)
}

impl From<GamePhase> for PhaseEntity {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Setup => PhaseEntity::Setup,
            GamePhase::Registration => PhaseEntity::Registration,
            GamePhase::Voting => PhaseEntity::Voting,
            GamePhase::Results => PhaseEntity::Results,
        }
    }
}

impl From<PhaseEntity> for GamePhase {
    fn from(value: PhaseEntity) -> Self {
        match value {
            PhaseEntity::Setup => GamePhase::Setup,
            PhaseEntity::Registration => GamePhase::Registration,
            PhaseEntity::Voting => GamePhase::Voting,
            PhaseEntity::Results => GamePhase::Results,
        }
    }
}

impl From<VoteStatus> for VoteStatusEntity {
    fn from(value: VoteStatus) -> Self {
        match value {
            VoteStatus::Pending => VoteStatusEntity::Pending,
            VoteStatus::Submitted => VoteStatusEntity::Submitted,
            VoteStatus::Settled => VoteStatusEntity::Settled,
        }
    }
}

impl From<VoteStatusEntity> for VoteStatus {
    fn from(value: VoteStatusEntity) -> Self {
        match value {
            VoteStatusEntity::Pending => VoteStatus::Pending,
            VoteStatusEntity::Submitted => VoteStatus::Submitted,
            VoteStatusEntity::Settled => VoteStatus::Settled,
        }
    }
}

impl From<Settings> for SettingsEntity {
    fn from(value: Settings) -> Self {
        Self {
            num_teams: value.num_teams,
            initial_points: value.initial_points,
            multiplier: value.multiplier,
            hide_points: value.hide_points,
        }
    }
}

impl From<SettingsEntity> for Settings {
    fn from(value: SettingsEntity) -> Self {
        Self {
            num_teams: value.num_teams,
            initial_points: value.initial_points,
            multiplier: value.multiplier,
            hide_points: value.hide_points,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            name: value.name,
            team: value.team,
            points: value.points,
            current_vote: value.current_vote,
            last_round_change: value.last_round_change,
            vote_status: value.vote_status.into(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        // Older documents only carry the nullable vote.
        let vote_status = match (value.vote_status, value.current_vote) {
            (VoteStatusEntity::Pending, Some(_)) => VoteStatus::Submitted,
            (status, _) => status.into(),
        };
        Self {
            name: value.name,
            team: value.team,
            points: value.points,
            current_vote: value.current_vote,
            last_round_change: value.last_round_change,
            vote_status,
        }
    }
}

impl From<GameRecord> for GameEntity {
    fn from(value: GameRecord) -> Self {
        Self {
            phase: value.phase.into(),
            settings: value.settings.into(),
            players: value
                .players
                .into_iter()
                .map(|(id, player)| (id.to_string(), player.into()))
                .collect(),
            current_round: value.current_round,
            team_pots: value
                .team_pots
                .into_iter()
                .map(|(team, pot)| (team.to_string(), pot))
                .collect(),
            settled_team_sizes: value
                .settled_team_sizes
                .into_iter()
                .map(|(team, size)| (team.to_string(), size))
                .collect(),
            updated_at: value.updated_at,
        }
    }
}

impl From<GameEntity> for GameRecord {
    fn from(value: GameEntity) -> Self {
        Self {
            phase: value.phase.into(),
            settings: value.settings.into(),
            players: value
                .players
                .into_iter()
                .map(|(id, player)| (PlayerId::from(id), player.into()))
                .collect(),
            current_round: value.current_round.max(1),
            team_pots: value
                .team_pots
                .into_iter()
                .filter_map(|(team, pot)| team.parse::<TeamId>().ok().map(|team| (team, pot)))
                .collect(),
            settled_team_sizes: value
                .settled_team_sizes
                .into_iter()
                .filter_map(|(team, size)| team.parse::<TeamId>().ok().map(|team| (team, size)))
                .collect(),
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn new_player_starts_pending_with_initial_points() {
        let player = Player::new("Ada".into(), 2, 20.0);
        assert_eq!(player.points, 20.0);
        assert_eq!(player.current_vote, None);
        assert_eq!(player.last_round_change, None);
        assert_eq!(player.vote_status, VoteStatus::Pending);
    }

    #[test]
    fn resubmission_is_an_explicit_overwrite() {
        let mut player = Player::new("Ada".into(), 1, 20.0);
        assert_eq!(player.submit(4.0), VoteTransition::Submitted);
        assert_eq!(
            player.submit(7.0),
            VoteTransition::Overwritten { previous: 4.0 }
        );
        assert_eq!(player.current_vote, Some(7.0));
        assert!(player.has_submitted());
    }

    #[test]
    fn contribution_is_clamped_to_whole_balance() {
        assert_eq!(clamp_contribution(5.0, 10.0), 5.0);
        assert_eq!(clamp_contribution(12.0, 10.0), 10.0);
        assert_eq!(clamp_contribution(9.9, 9.5), 9.0);
        assert_eq!(clamp_contribution(3.7, 10.0), 3.0);
        assert_eq!(clamp_contribution(-4.0, 10.0), 0.0);
        assert_eq!(clamp_contribution(f64::NAN, 10.0), 0.0);
        assert_eq!(clamp_contribution(f64::INFINITY, 10.0), 0.0);
        assert_eq!(clamp_contribution(2.0, 0.4), 0.0);
    }

    #[test]
    fn settings_update_is_partial() {
        let mut settings = Settings::default();
        let update = SettingsUpdate {
            hide_points: Some(true),
            ..Default::default()
        };
        assert!(!update.changes_game_rules());
        update.apply(&mut settings);
        assert!(settings.hide_points);
        assert_eq!(settings.num_teams, 3);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut record = GameRecord::new(Settings {
            num_teams: 5,
            initial_points: 3.0,
            multiplier: 0.5,
            hide_points: true,
        });
        record.phase = GamePhase::Results;
        record.current_round = 4;
        record
            .players
            .insert(PlayerId::from("1"), Player::new("Bo".into(), 1, 3.0));
        record.team_pots.insert(1, 2.0);

        record.reset(Settings::default());

        assert_eq!(record.phase, GamePhase::Setup);
        assert!(record.players.is_empty());
        assert!(record.team_pots.is_empty());
        assert_eq!(record.settings, Settings::default());
        assert_eq!(record.current_round, 1);
    }

    #[test]
    fn player_ids_are_bumped_past_collisions() {
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        let mut record = GameRecord::new(Settings::default());
        let first = record.next_player_id(now);
        assert_eq!(first.as_str(), "1700000000000");
        record
            .players
            .insert(first, Player::new("A".into(), 1, 20.0));

        let second = record.next_player_id(now);
        assert_eq!(second.as_str(), "1700000000001");
    }

    #[test]
    fn entity_round_trip_keeps_numeric_team_keys() {
        let mut record = GameRecord::new(Settings::default());
        record.phase = GamePhase::Results;
        record.team_pots.insert(2, 7.5);
        let mut player = Player::new("Cy".into(), 2, 20.0);
        player.submit(3.0);
        record.players.insert(PlayerId::from("42"), player);

        let entity: GameEntity = record.clone().into();
        assert_eq!(entity.team_pots.get("2"), Some(&7.5));

        let restored: GameRecord = entity.into();
        assert_eq!(restored, record);
    }
}
