#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, PlayerEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the backend holding the single shared game record.
///
/// `save_game` replaces the whole record; `save_player` only touches one
/// player slot so a contribution never rewrites unrelated fields.
pub trait GameStore: Send + Sync {
    fn load_game(&self) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn save_player(
        &self,
        player_id: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
