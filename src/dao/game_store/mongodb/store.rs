use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, game_filter, player_update},
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    /// Owns the connection pool that `database` draws from.
    _client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard._client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState {
                _client: client,
                database,
            }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn load_game(&self) -> MongoResult<Option<GameEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(game_filter())
            .await
            .map_err(|source| MongoDaoError::LoadGame { source })?;
        Ok(document.map(Into::into))
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let document: MongoGameDocument = game.into();
        let collection = self.collection().await;
        collection
            .replace_one(game_filter(), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { source })?;
        Ok(())
    }

    /// Returns whether the game document existed.
    async fn save_player(&self, player_id: &str, player: &PlayerEntity) -> MongoResult<bool> {
        let collection = self.collection().await;
        let result = collection
            .update_one(game_filter(), player_update(player_id, player))
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                player_id: player_id.to_owned(),
                source,
            })?;
        Ok(result.matched_count > 0)
    }
}

impl GameStore for MongoGameStore {
    fn load_game(&self) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_game().await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn save_player(
        &self,
        player_id: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store.save_player(&player_id, &player).await? {
                Ok(())
            } else {
                Err(StorageError::MissingGame { player_id })
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
