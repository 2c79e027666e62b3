//! The single writer of the game record.
//!
//! Every mutation arrives as a [`GameCommand`] on a bounded queue and is
//! applied in arrival order. A command builds a candidate record, persists it,
//! and only then replaces the in-memory record and publishes it. A failed or
//! timed-out write leaves the record untouched.

use std::{
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    services::sse_events,
    state::{
        AppState,
        game::{
            GameRecord, Player, PlayerId, Settings, SettingsUpdate, TeamId, VoteStatus,
            VoteTransition, clamp_contribution,
        },
        settlement::settle,
        state_machine::{GameEvent, GamePhase, GameStateMachine},
    },
};

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Reply channel carried by every command.
pub type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// A request to mutate the game record.
pub enum GameCommand {
    /// Partial settings change.
    UpdateSettings {
        update: SettingsUpdate,
        reply: Reply<Settings>,
    },
    /// Phase transition with its side effects.
    Transition {
        event: GameEvent,
        reply: Reply<GamePhase>,
    },
    /// Every player back to the starting balance, phase unchanged.
    ResetScores { reply: Reply<usize> },
    /// Join a team.
    Register {
        name: String,
        team: TeamId,
        reply: Reply<Registration>,
    },
    /// Record a player's contribution for the running round.
    SubmitContribution {
        player_id: PlayerId,
        amount: f64,
        reply: Reply<ContributionReceipt>,
    },
    /// A storage backend became reachable; reconcile it with memory.
    AttachStore {
        store: Arc<dyn GameStore>,
        reply: Reply<()>,
    },
}

/// A freshly registered player.
#[derive(Debug, Clone)]
pub struct Registration {
    pub player_id: PlayerId,
    pub player: Player,
}

/// What the engine did with a submitted contribution.
#[derive(Debug, Clone)]
pub struct ContributionReceipt {
    pub player_id: PlayerId,
    /// Amount the client asked for.
    pub requested: f64,
    /// Amount actually stored after clamping.
    pub stored: f64,
    pub transition: VoteTransition,
    pub player: Player,
}

enum WriteScope<'a> {
    Record,
    Player(&'a PlayerId),
}

pub(crate) struct GameEngine {
    record: GameRecord,
    machine: GameStateMachine,
    defaults: Settings,
    published: watch::Sender<GameRecord>,
    state: Weak<AppState>,
    timeout: Option<Duration>,
    /// Set once memory holds changes the store never saw at startup.
    committed: bool,
    /// A write was skipped; the next write must carry the whole record.
    needs_full_sync: bool,
}

impl GameEngine {
    pub(crate) fn new(
        record: GameRecord,
        defaults: Settings,
        published: watch::Sender<GameRecord>,
        state: Weak<AppState>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            machine: GameStateMachine::resume(record.phase),
            record,
            defaults,
            published,
            state,
            timeout,
            committed: false,
            needs_full_sync: false,
        }
    }

    /// Consume commands until every sender is gone or the app state is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<GameCommand>) {
        while let Some(command) = commands.recv().await {
            let Some(state) = self.state.upgrade() else {
                break;
            };
            self.handle(&state, command).await;
        }
        debug!("game engine stopped");
    }

    async fn handle(&mut self, state: &AppState, command: GameCommand) {
        match command {
            GameCommand::UpdateSettings { update, reply } => {
                let _ = reply.send(self.update_settings(state, update).await);
            }
            GameCommand::Transition { event, reply } => {
                let _ = reply.send(self.transition(state, event).await);
            }
            GameCommand::ResetScores { reply } => {
                let _ = reply.send(self.reset_scores(state).await);
            }
            GameCommand::Register { name, team, reply } => {
                let _ = reply.send(self.register(state, name, team).await);
            }
            GameCommand::SubmitContribution {
                player_id,
                amount,
                reply,
            } => {
                let _ = reply.send(self.submit(state, player_id, amount).await);
            }
            GameCommand::AttachStore { store, reply } => {
                let _ = reply.send(self.attach_store(state, store).await);
            }
        }
    }

    async fn update_settings(
        &mut self,
        state: &AppState,
        update: SettingsUpdate,
    ) -> Result<Settings, ServiceError> {
        if update.changes_game_rules() && self.record.phase != GamePhase::Setup {
            return Err(ServiceError::InvalidState(
                "teams, starting points and multiplier can only change during setup".into(),
            ));
        }
        validate_settings_update(&update)?;

        let mut candidate = self.record.clone();
        update.apply(&mut candidate.settings);
        candidate.touch();
        self.persist(state, &candidate, WriteScope::Record).await?;

        info!(
            num_teams = candidate.settings.num_teams,
            initial_points = candidate.settings.initial_points,
            multiplier = candidate.settings.multiplier,
            hide_points = candidate.settings.hide_points,
            "settings updated"
        );
        let settings = candidate.settings;
        self.commit(state, candidate, false);
        Ok(settings)
    }

    async fn transition(
        &mut self,
        state: &AppState,
        event: GameEvent,
    ) -> Result<GamePhase, ServiceError> {
        let plan = self.machine.plan(event)?;

        let mut candidate = self.record.clone();
        match event {
            GameEvent::Settle => {
                let outcome = settle(&candidate.players, candidate.settings.multiplier);
                for (team, result) in &outcome.teams {
                    info!(
                        round = candidate.current_round,
                        team,
                        raw_pot = result.raw_pot,
                        multiplied_pot = result.multiplied_pot,
                        share = result.share,
                        members = result.members,
                        "team pot settled"
                    );
                }
                candidate.team_pots = outcome.team_pots();
                candidate.settled_team_sizes = outcome.team_sizes();
                candidate.players = outcome.players;
            }
            GameEvent::NextRound => {
                candidate.current_round += 1;
                candidate.team_pots.clear();
                candidate.settled_team_sizes.clear();
                for player in candidate.players.values_mut() {
                    player.current_vote = None;
                    player.vote_status = VoteStatus::Pending;
                }
            }
            GameEvent::Reset => candidate.reset(self.defaults),
            GameEvent::OpenRegistration | GameEvent::StartGame => {}
        }
        candidate.phase = plan.to;
        candidate.touch();

        if let Err(err) = self.persist(state, &candidate, WriteScope::Record).await {
            if let Err(abort_err) = self.machine.abort(plan.id) {
                warn!(
                    event = ?event,
                    plan_id = %plan.id,
                    error = ?abort_err,
                    "failed to abort transition after persistence error"
                );
            }
            warn!(event = ?event, error = %err, "transition not applied");
            return Err(err);
        }

        let next = self.machine.apply(plan.id)?;
        info!(
            from = plan.from.as_str(),
            phase = next.as_str(),
            round = candidate.current_round,
            version = plan.version_next,
            "phase changed"
        );
        self.commit(state, candidate, true);
        Ok(next)
    }

    async fn reset_scores(&mut self, state: &AppState) -> Result<usize, ServiceError> {
        let mut candidate = self.record.clone();
        let initial_points = candidate.settings.initial_points;
        for player in candidate.players.values_mut() {
            player.reset_score(initial_points);
        }
        candidate.touch();
        self.persist(state, &candidate, WriteScope::Record).await?;

        let count = candidate.players.len();
        info!(players = count, initial_points, "scores reset");
        self.commit(state, candidate, false);
        Ok(count)
    }

    async fn register(
        &mut self,
        state: &AppState,
        name: String,
        team: TeamId,
    ) -> Result<Registration, ServiceError> {
        if self.record.phase == GamePhase::Setup {
            return Err(ServiceError::InvalidState(
                "registration has not been opened yet".into(),
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        let num_teams = self.record.settings.num_teams;
        if team == 0 || team > num_teams {
            return Err(ServiceError::InvalidInput(format!(
                "team must be between 1 and {num_teams}"
            )));
        }

        let mut candidate = self.record.clone();
        let player_id = candidate.next_player_id(SystemTime::now());
        let player = Player::new(name.to_owned(), team, candidate.settings.initial_points);
        candidate.players.insert(player_id.clone(), player.clone());
        candidate.touch();
        self.persist(state, &candidate, WriteScope::Player(&player_id))
            .await?;

        info!(player_id = %player_id, team, name = %player.name, "player registered");
        self.commit(state, candidate, false);
        Ok(Registration { player_id, player })
    }

    async fn submit(
        &mut self,
        state: &AppState,
        player_id: PlayerId,
        requested: f64,
    ) -> Result<ContributionReceipt, ServiceError> {
        if self.record.phase != GamePhase::Voting {
            return Err(ServiceError::InvalidState(format!(
                "contributions are only accepted while voting (current phase: {})",
                self.record.phase.as_str()
            )));
        }

        let mut candidate = self.record.clone();
        let player = candidate
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
        let stored = clamp_contribution(requested, player.points);
        let transition = player.submit(stored);
        let player = player.clone();
        candidate.touch();
        self.persist(state, &candidate, WriteScope::Player(&player_id))
            .await?;

        match transition {
            VoteTransition::Submitted => info!(
                player_id = %player_id,
                team = player.team,
                round = candidate.current_round,
                requested,
                stored,
                "contribution submitted"
            ),
            VoteTransition::Overwritten { previous } => info!(
                player_id = %player_id,
                team = player.team,
                round = candidate.current_round,
                previous,
                stored,
                "contribution overwritten"
            ),
        }
        self.commit(state, candidate, false);
        Ok(ContributionReceipt {
            player_id,
            requested,
            stored,
            transition,
            player,
        })
    }

    async fn attach_store(
        &mut self,
        state: &AppState,
        store: Arc<dyn GameStore>,
    ) -> Result<(), ServiceError> {
        if !self.committed {
            if let Some(entity) = self.bounded(store.load_game()).await? {
                let record = GameRecord::from(entity);
                info!(
                    phase = record.phase.as_str(),
                    round = record.current_round,
                    players = record.players.len(),
                    "restored game from storage"
                );
                self.machine = GameStateMachine::resume(record.phase);
                self.record = record;
                self.committed = true;
                self.needs_full_sync = false;
                self.publish(state, true);
                state.install_game_store(store).await;
                return Ok(());
            }
        }

        self.bounded(store.save_game(self.record.clone().into())).await?;
        self.needs_full_sync = false;
        debug!(
            phase = self.record.phase.as_str(),
            "storage synchronised with in-memory game"
        );
        state.install_game_store(store).await;
        Ok(())
    }

    /// Write `candidate` (or one player of it) to the store.
    ///
    /// Without a reachable store the change is kept in memory and the next
    /// write becomes a full one. A failed write may still have landed, so it
    /// also forces the next write to be a full one.
    async fn persist(
        &mut self,
        state: &AppState,
        candidate: &GameRecord,
        scope: WriteScope<'_>,
    ) -> Result<(), ServiceError> {
        let store = match state.game_store().await {
            Some(store) if !state.is_degraded() => store,
            _ => {
                if !self.needs_full_sync {
                    warn!("storage unavailable; keeping changes in memory only");
                }
                self.needs_full_sync = true;
                return Ok(());
            }
        };

        let result = self.write(store.as_ref(), candidate, scope).await;
        self.needs_full_sync = result.is_err();
        result
    }

    async fn write(
        &self,
        store: &dyn GameStore,
        candidate: &GameRecord,
        scope: WriteScope<'_>,
    ) -> Result<(), ServiceError> {
        let partial = match scope {
            WriteScope::Player(player_id) if !self.needs_full_sync => candidate
                .players
                .get(player_id)
                .map(|player| (player_id, player.clone())),
            _ => None,
        };
        if let Some((player_id, player)) = partial {
            match self
                .bounded(store.save_player(player_id.to_string(), player.into()))
                .await
            {
                Ok(()) => return Ok(()),
                Err(ServiceError::Unavailable(StorageError::MissingGame { .. })) => {
                    debug!(player_id = %player_id, "stored game missing; writing full record");
                }
                Err(err) => return Err(err),
            }
        }

        self.bounded(store.save_game(candidate.clone().into())).await
    }

    async fn bounded<T>(
        &self,
        operation: BoxFuture<'static, StorageResult<T>>,
    ) -> Result<T, ServiceError> {
        let result = match self.timeout {
            Some(limit) => timeout(limit, operation)
                .await
                .map_err(|_| ServiceError::Timeout)?,
            None => operation.await,
        };
        result.map_err(Into::into)
    }

    fn commit(&mut self, state: &AppState, candidate: GameRecord, phase_changed: bool) {
        self.record = candidate;
        self.committed = true;
        self.publish(state, phase_changed);
    }

    fn publish(&mut self, state: &AppState, phase_changed: bool) {
        self.published.send_replace(self.record.clone());
        sse_events::broadcast_game_updated(state, &self.record);
        if phase_changed {
            sse_events::broadcast_phase_changed(state, &self.record);
        }
    }
}

fn validate_settings_update(update: &SettingsUpdate) -> Result<(), ServiceError> {
    if update.num_teams == Some(0) {
        return Err(ServiceError::InvalidInput(
            "num_teams must be at least 1".into(),
        ));
    }
    if update
        .initial_points
        .is_some_and(|points| !(points.is_finite() && points >= 0.0))
    {
        return Err(ServiceError::InvalidInput(
            "initial_points must be a non-negative number".into(),
        ));
    }
    if update
        .multiplier
        .is_some_and(|multiplier| !(multiplier.is_finite() && multiplier >= 0.0))
    {
        return Err(ServiceError::InvalidInput(
            "multiplier must be a non-negative number".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        state::{AppState, SharedState},
    };

    async fn attached_state() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.attach_store(Arc::new(store.clone())).await.unwrap();
        (state, store)
    }

    async fn voting_with_two_teams(state: &SharedState) -> (PlayerId, PlayerId, PlayerId) {
        state
            .update_settings(SettingsUpdate {
                num_teams: Some(2),
                initial_points: Some(10.0),
                multiplier: Some(2.0),
                hide_points: None,
            })
            .await
            .unwrap();
        state.transition(GameEvent::OpenRegistration).await.unwrap();
        let a = state.register("Ada".into(), 1).await.unwrap().player_id;
        let b = state.register("Bob".into(), 1).await.unwrap().player_id;
        let c = state.register("Cy".into(), 2).await.unwrap().player_id;
        state.transition(GameEvent::StartGame).await.unwrap();
        (a, b, c)
    }

    #[tokio::test]
    async fn full_round_settles_and_persists() {
        let (state, store) = attached_state().await;
        let (a, b, c) = voting_with_two_teams(&state).await;

        state.submit_contribution(a.clone(), 4.0).await.unwrap();
        state.submit_contribution(b.clone(), 0.0).await.unwrap();
        state.submit_contribution(c.clone(), 10.0).await.unwrap();
        state.transition(GameEvent::Settle).await.unwrap();

        let game = state.game();
        assert_eq!(game.phase, GamePhase::Results);
        assert_eq!(game.players[&a].points, 10.0);
        assert_eq!(game.players[&b].points, 14.0);
        assert_eq!(game.players[&c].points, 20.0);
        assert_eq!(game.team_pots.get(&1), Some(&4.0));
        assert_eq!(game.team_pots.get(&2), Some(&10.0));
        assert_eq!(game.players[&a].vote_status, VoteStatus::Settled);

        let stored = GameRecord::from(store.stored().await.unwrap());
        assert_eq!(stored.players, game.players);
        assert_eq!(stored.phase, GamePhase::Results);
    }

    #[tokio::test]
    async fn next_round_clears_round_state() {
        let (state, _store) = attached_state().await;
        let (a, _, _) = voting_with_two_teams(&state).await;
        state.submit_contribution(a.clone(), 3.0).await.unwrap();
        state.transition(GameEvent::Settle).await.unwrap();
        state.transition(GameEvent::NextRound).await.unwrap();

        let game = state.game();
        assert_eq!(game.phase, GamePhase::Voting);
        assert_eq!(game.current_round, 2);
        assert!(game.team_pots.is_empty());
        assert!(
            game.players
                .values()
                .all(|p| p.vote_status == VoteStatus::Pending && p.current_vote.is_none())
        );
        assert_eq!(game.players[&a].last_round_change, Some(0.0));
    }

    #[tokio::test]
    async fn contribution_outside_voting_is_rejected() {
        let (state, _store) = attached_state().await;
        let (a, _, _) = voting_with_two_teams(&state).await;
        state.transition(GameEvent::Settle).await.unwrap();

        let err = state.submit_contribution(a, 1.0).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn contribution_is_clamped_and_overwritable() {
        let (state, _store) = attached_state().await;
        let (a, _, _) = voting_with_two_teams(&state).await;

        let first = state.submit_contribution(a.clone(), 25.7).await.unwrap();
        assert_eq!(first.stored, 10.0);
        assert_eq!(first.transition, VoteTransition::Submitted);

        let second = state.submit_contribution(a.clone(), 2.0).await.unwrap();
        assert_eq!(second.stored, 2.0);
        assert_eq!(
            second.transition,
            VoteTransition::Overwritten { previous: 10.0 }
        );
        assert_eq!(state.game().players[&a].current_vote, Some(2.0));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let (state, _store) = attached_state().await;
        voting_with_two_teams(&state).await;
        let err = state
            .submit_contribution(PlayerId::from("42"), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn registration_rules() {
        let (state, _store) = attached_state().await;
        let err = state.register("Ada".into(), 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        state.transition(GameEvent::OpenRegistration).await.unwrap();
        assert!(matches!(
            state.register("   ".into(), 1).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            state.register("Ada".into(), 4).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            state.register("x".repeat(65), 1).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));

        let first = state.register("  Ada ".into(), 3).await.unwrap();
        let second = state.register("Ada".into(), 3).await.unwrap();
        assert_eq!(first.player.name, "Ada");
        assert_eq!(first.player.points, 20.0);
        assert_ne!(first.player_id, second.player_id);
    }

    #[tokio::test]
    async fn late_registration_during_voting() {
        let (state, _store) = attached_state().await;
        voting_with_two_teams(&state).await;
        let late = state.register("Dee".into(), 2).await.unwrap();
        assert_eq!(late.player.vote_status, VoteStatus::Pending);
        assert_eq!(state.game().players.len(), 4);
    }

    #[tokio::test]
    async fn failed_write_leaves_record_untouched() {
        let (state, store) = attached_state().await;
        state.transition(GameEvent::OpenRegistration).await.unwrap();
        store.set_offline(true);

        let err = state.transition(GameEvent::StartGame).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(state.game().phase, GamePhase::Registration);

        store.set_offline(false);
        state.transition(GameEvent::StartGame).await.unwrap();
        assert_eq!(state.game().phase, GamePhase::Voting);
    }

    #[tokio::test]
    async fn degraded_mode_keeps_working_in_memory() {
        let (state, store) = attached_state().await;
        state.set_degraded(true);
        store.set_offline(true);

        state.transition(GameEvent::OpenRegistration).await.unwrap();
        let ada = state.register("Ada".into(), 1).await.unwrap();
        assert_eq!(state.game().phase, GamePhase::Registration);

        store.set_offline(false);
        state.attach_store(Arc::new(store.clone())).await.unwrap();
        assert!(!state.is_degraded());
        let stored = GameRecord::from(store.stored().await.unwrap());
        assert_eq!(stored.phase, GamePhase::Registration);
        assert!(stored.players.contains_key(&ada.player_id));
    }

    #[tokio::test]
    async fn stored_game_is_restored_on_attach() {
        let store = MemoryGameStore::new();
        {
            let state = AppState::new(AppConfig::default());
            state.attach_store(Arc::new(store.clone())).await.unwrap();
            state.transition(GameEvent::OpenRegistration).await.unwrap();
            state.register("Ada".into(), 2).await.unwrap();
        }

        let state = AppState::new(AppConfig::default());
        state.attach_store(Arc::new(store.clone())).await.unwrap();
        let game = state.game();
        assert_eq!(game.phase, GamePhase::Registration);
        assert_eq!(game.players.len(), 1);
        state.transition(GameEvent::StartGame).await.unwrap();
    }

    #[tokio::test]
    async fn settings_locked_after_setup_except_visibility() {
        let (state, _store) = attached_state().await;
        state.transition(GameEvent::OpenRegistration).await.unwrap();

        let err = state
            .update_settings(SettingsUpdate {
                multiplier: Some(3.0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let settings = state
            .update_settings(SettingsUpdate {
                hide_points: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(settings.hide_points);
    }

    #[tokio::test]
    async fn reset_restores_defaults_and_reset_scores_keeps_roster() {
        let (state, _store) = attached_state().await;
        let (a, _, _) = voting_with_two_teams(&state).await;
        state.submit_contribution(a.clone(), 5.0).await.unwrap();
        state.transition(GameEvent::Settle).await.unwrap();

        assert_eq!(state.reset_scores().await.unwrap(), 3);
        let game = state.game();
        assert_eq!(game.phase, GamePhase::Results);
        assert!(game.players.values().all(|p| p.points == 10.0));
        assert_eq!(game.players[&a].last_round_change, None);

        state.transition(GameEvent::Reset).await.unwrap();
        let game = state.game();
        assert_eq!(game.phase, GamePhase::Setup);
        assert!(game.players.is_empty());
        assert_eq!(game.settings, Settings::default());
        assert_eq!(game.current_round, 1);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let (state, _store) = attached_state().await;
        let err = state.transition(GameEvent::Settle).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(state.game().phase, GamePhase::Setup);
    }

    #[tokio::test]
    async fn settlement_sizes_survive_late_joins_until_next_round() {
        let (state, _store) = attached_state().await;
        let (a, _, c) = voting_with_two_teams(&state).await;
        state.submit_contribution(a, 6.0).await.unwrap();
        state.submit_contribution(c, 5.0).await.unwrap();
        state.transition(GameEvent::Settle).await.unwrap();

        state.register("Late".into(), 2).await.unwrap();
        let game = state.game();
        assert_eq!(game.settled_team_sizes.get(&1), Some(&2));
        assert_eq!(game.settled_team_sizes.get(&2), Some(&1));

        state.transition(GameEvent::NextRound).await.unwrap();
        assert!(state.game().settled_team_sizes.is_empty());
    }

    #[tokio::test]
    async fn write_after_a_failed_write_rewrites_the_whole_record() {
        let (state, store) = attached_state().await;
        let (a, b, _) = voting_with_two_teams(&state).await;

        store.set_offline(true);
        let err = state.submit_contribution(a.clone(), 4.0).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        store.set_offline(false);

        // the store applied the rejected write anyway
        let mut landed = state.game().players[&a].clone();
        landed.submit(4.0);
        store.save_player(a.to_string(), landed.into()).await.unwrap();

        state.submit_contribution(b, 1.0).await.unwrap();
        let stored = GameRecord::from(store.stored().await.unwrap());
        assert_eq!(stored.players[&a].current_vote, None);
        assert_eq!(stored.players, state.game().players);
    }
}
