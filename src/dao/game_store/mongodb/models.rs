use std::collections::BTreeMap;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{GameEntity, PhaseEntity, PlayerEntity, SettingsEntity};

/// `_id` of the one game document.
pub const GAME_DOCUMENT_ID: &str = "game";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    phase: PhaseEntity,
    settings: SettingsEntity,
    #[serde(default)]
    players: BTreeMap<String, PlayerEntity>,
    current_round: u32,
    #[serde(default)]
    team_pots: BTreeMap<String, f64>,
    #[serde(default)]
    settled_team_sizes: BTreeMap<String, usize>,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: GAME_DOCUMENT_ID.to_owned(),
            phase: value.phase,
            settings: value.settings,
            players: value.players,
            current_round: value.current_round,
            team_pots: value.team_pots,
            settled_team_sizes: value.settled_team_sizes,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            phase: value.phase,
            settings: value.settings,
            players: value.players,
            current_round: value.current_round,
            team_pots: value.team_pots,
            settled_team_sizes: value.settled_team_sizes,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn game_filter() -> Document {
    doc! {"_id": GAME_DOCUMENT_ID}
}

/// `$set` update replacing a single `players.<id>` slot.
pub fn player_update(player_id: &str, player: &PlayerEntity) -> Document {
    let slot = doc! {
        "name": player.name.clone(),
        "team": i64::from(player.team),
        "points": player.points,
        "current_vote": player.current_vote,
        "last_round_change": player.last_round_change,
        "vote_status": vote_status_name(player),
    };

    let mut fields = Document::new();
    fields.insert(format!("players.{player_id}"), slot);
    fields.insert("updated_at", DateTime::now());
    doc! {"$set": fields}
}

fn vote_status_name(player: &PlayerEntity) -> &'static str {
    use crate::dao::models::VoteStatusEntity;

    match player.vote_status {
        VoteStatusEntity::Pending => "pending",
        VoteStatusEntity::Submitted => "submitted",
        VoteStatusEntity::Settled => "settled",
    }
}
