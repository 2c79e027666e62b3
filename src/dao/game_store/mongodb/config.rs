use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "pot_share";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Connection settings for the MongoDB game store.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Pings tried before a connection attempt is reported as failed.
    pub connect_attempts: u32,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, database_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        if options.app_name.is_none() {
            options.app_name = Some("pot-share-back".into());
        }

        Ok(Self {
            options,
            database_name: database_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// `MONGO_URI` is required. `MONGO_DB` defaults to `pot_share` and
    /// `MONGO_CONNECT_ATTEMPTS` to 5.
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            env::var("MONGO_URI").map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let database_name = env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, database_name.as_deref()).await?;
        if let Some(attempts) = env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.connect_attempts = attempts;
        }
        Ok(config)
    }
}
