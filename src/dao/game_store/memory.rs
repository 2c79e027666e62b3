//! Process-local store. Default backend when no database is configured, and
//! the backend used by tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    game: RwLock<Option<GameEntity>>,
    offline: AtomicBool,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Copy of the stored record.
    pub async fn stored(&self) -> Option<GameEntity> {
        self.inner.game.read().await.clone()
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ));
        }
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn load_game(&self) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            Ok(store.inner.game.read().await.clone())
        })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            *store.inner.game.write().await = Some(game);
            Ok(())
        })
    }

    fn save_player(
        &self,
        player_id: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            let mut guard = store.inner.game.write().await;
            let game = guard
                .as_mut()
                .ok_or(StorageError::MissingGame {
                    player_id: player_id.clone(),
                })?;
            game.players.insert(player_id, player);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_online() })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, time::SystemTime};

    use super::*;
    use crate::dao::models::{PhaseEntity, SettingsEntity, VoteStatusEntity};

    fn game() -> GameEntity {
        GameEntity {
            phase: PhaseEntity::Voting,
            settings: SettingsEntity {
                num_teams: 2,
                initial_points: 20.0,
                multiplier: 2.0,
                hide_points: false,
            },
            players: BTreeMap::new(),
            current_round: 1,
            team_pots: BTreeMap::new(),
            settled_team_sizes: BTreeMap::new(),
            updated_at: SystemTime::now(),
        }
    }

    fn player() -> PlayerEntity {
        PlayerEntity {
            name: "Ada".into(),
            team: 1,
            points: 20.0,
            current_vote: Some(3.0),
            last_round_change: None,
            vote_status: VoteStatusEntity::Submitted,
        }
    }

    #[tokio::test]
    async fn player_write_only_touches_its_slot() {
        let store = MemoryGameStore::new();
        store.save_game(game()).await.unwrap();
        store.save_player("7".into(), player()).await.unwrap();

        let stored = store.load_game().await.unwrap().unwrap();
        assert_eq!(stored.phase, PhaseEntity::Voting);
        assert_eq!(stored.players.get("7"), Some(&player()));
    }

    #[tokio::test]
    async fn player_write_without_game_fails() {
        let store = MemoryGameStore::new();
        let err = store.save_player("7".into(), player()).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingGame { .. }));
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let store = MemoryGameStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
