pub mod engine;
pub mod game;
pub mod settlement;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot, watch};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    services::sse_events,
    state::{
        engine::{ContributionReceipt, GameCommand, GameEngine, Registration, Reply},
        game::{GameRecord, PlayerId, Settings, SettingsUpdate, TeamId},
        state_machine::{GameEvent, GamePhase},
    },
};

pub use self::sse::SseHub;
pub use self::state_machine::{ApplyError, PlanError};
use self::sse::SseState;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected player socket.
pub struct PlayerConnection {
    /// Distinguishes two sockets opened by the same player.
    pub conn_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: push channels, the storage handle, and the
/// queue into the game engine.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sse: SseState,
    players: DashMap<PlayerId, PlayerConnection>,
    commands: mpsc::Sender<GameCommand>,
    game: watch::Receiver<GameRecord>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct the shared state and spawn the game engine task.
    ///
    /// Must be called from within a Tokio runtime. The application starts in
    /// degraded mode until a storage backend is attached.
    pub fn new(config: AppConfig) -> SharedState {
        let defaults = config.default_settings();
        let (degraded_tx, _rx) = watch::channel(true);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue_capacity());
        let (game_tx, game_rx) = watch::channel(GameRecord::new(defaults));
        let transition_timeout = config.transition_timeout();

        let state = Arc::new(Self {
            sse: SseState::new(config.sse_capacity()),
            game_store: RwLock::new(None),
            players: DashMap::new(),
            commands: commands_tx,
            game: game_rx,
            degraded: degraded_tx,
        });

        let engine = GameEngine::new(
            GameRecord::new(defaults),
            defaults,
            game_tx,
            Arc::downgrade(&state),
            transition_timeout,
        );
        tokio::spawn(engine.run(commands_rx));

        state
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a game store and leave degraded mode. Only the engine calls
    /// this, once the store holds the current record.
    pub(crate) async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, announcing it on both SSE streams when it changes.
    pub fn set_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            info!(degraded = value, "degraded mode changed");
            sse_events::broadcast_system_status(self, value);
        }
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin_token()
    }

    /// Registry of live player sockets keyed by player id.
    pub fn players(&self) -> &DashMap<PlayerId, PlayerConnection> {
        &self.players
    }

    /// Copy of the last committed record.
    pub fn game(&self) -> GameRecord {
        self.game.borrow().clone()
    }

    /// Receiver notified on every commit.
    pub fn subscribe_game(&self) -> watch::Receiver<GameRecord> {
        self.game.clone()
    }

    /// Apply a partial settings change.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, ServiceError> {
        self.dispatch(|reply| GameCommand::UpdateSettings { update, reply })
            .await
    }

    /// Run a phase transition.
    pub async fn transition(&self, event: GameEvent) -> Result<GamePhase, ServiceError> {
        self.dispatch(|reply| GameCommand::Transition { event, reply })
            .await
    }

    /// Reset every balance; returns how many players were touched.
    pub async fn reset_scores(&self) -> Result<usize, ServiceError> {
        self.dispatch(|reply| GameCommand::ResetScores { reply })
            .await
    }

    /// Register a new player.
    pub async fn register(&self, name: String, team: TeamId) -> Result<Registration, ServiceError> {
        self.dispatch(|reply| GameCommand::Register { name, team, reply })
            .await
    }

    /// Submit a contribution on behalf of `player_id`.
    pub async fn submit_contribution(
        &self,
        player_id: PlayerId,
        amount: f64,
    ) -> Result<ContributionReceipt, ServiceError> {
        self.dispatch(|reply| GameCommand::SubmitContribution {
            player_id,
            amount,
            reply,
        })
        .await
    }

    /// Hand a reachable store to the engine, which syncs it and installs it.
    pub async fn attach_store(&self, store: Arc<dyn GameStore>) -> Result<(), ServiceError> {
        self.dispatch(|reply| GameCommand::AttachStore { store, reply })
            .await
    }

    async fn dispatch<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ServiceError::EngineStopped)?;
        response.await.map_err(|_| ServiceError::EngineStopped)?
    }
}
