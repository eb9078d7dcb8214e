use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::participant::PlayerRef;

/// A candidate move as submitted by a player or the move generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

impl MoveInput {
    pub fn new(from: &str, to: &str) -> Self {
        MoveInput {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }
}

/// Append-only record of one accepted move, written after successful
/// rule-engine validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub id: String,
    pub match_id: String,
    pub player: PlayerRef,
    pub notation: String,
    pub resulting_position: String,
    pub created_at: DateTime<Utc>,
}

impl MoveRecord {
    pub fn new(
        match_id: &str,
        player: PlayerRef,
        notation: &str,
        resulting_position: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        MoveRecord {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            player,
            notation: notation.to_string(),
            resulting_position: resulting_position.to_string(),
            created_at,
        }
    }
}
