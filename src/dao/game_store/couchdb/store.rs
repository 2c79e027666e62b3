use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::debug;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchGameDocument, GAME_DOC_ID},
};

/// Revision conflicts are retried this many times before giving up.
const MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_game(&self) -> CouchResult<Option<CouchGameDocument>> {
        let response = self
            .request(Method::GET, GAME_DOC_ID)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: GAME_DOC_ID.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchGameDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: GAME_DOC_ID.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: GAME_DOC_ID.to_string(),
                status: other,
            }),
        }
    }

    async fn put_game(&self, document: &CouchGameDocument) -> CouchResult<()> {
        let response = self
            .request(Method::PUT, GAME_DOC_ID)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: GAME_DOC_ID.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: GAME_DOC_ID.to_string(),
            }),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: GAME_DOC_ID.to_string(),
                status: other,
            }),
        }
    }

    /// Read the current revision, let `update` produce the new body, write it
    /// back; retried on revision conflicts.
    async fn read_modify_write<F>(&self, mut update: F) -> StorageResult<()>
    where
        F: FnMut(Option<GameEntity>) -> StorageResult<GameEntity>,
    {
        let mut attempt = 0;
        loop {
            let existing = self.get_game().await?;
            let (rev, current) = match existing {
                Some(doc) => (doc.rev, Some(doc.game)),
                None => (None, None),
            };
            let document = CouchGameDocument::new(update(current)?, rev);

            match self.put_game(&document).await {
                Err(CouchDaoError::Conflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    debug!(attempt, "CouchDB revision conflict; retrying write");
                }
                other => return other.map_err(Into::into),
            }
        }
    }
}

impl GameStore for CouchGameStore {
    fn load_game(&self) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.get_game().await?.map(|doc| doc.game)) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.read_modify_write(|_| Ok(game.clone())).await })
    }

    fn save_player(
        &self,
        player_id: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read_modify_write(|current| {
                    let mut game = current.ok_or_else(|| StorageError::MissingGame {
                        player_id: player_id.clone(),
                    })?;
                    game.players.insert(player_id.clone(), player.clone());
                    Ok(game)
                })
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
