use serde::{Deserialize, Serialize};

use crate::dao::models::GameEntity;

/// Document id of the one game record.
pub const GAME_DOC_ID: &str = "game::current";

/// Game record wrapped with CouchDB bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl CouchGameDocument {
    pub fn new(game: GameEntity, rev: Option<String>) -> Self {
        Self {
            id: GAME_DOC_ID.to_owned(),
            rev,
            game,
        }
    }
}
