use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::move_record::MoveRecord;
use crate::repositories::errors::move_repository_errors::MoveRepositoryError;

/// Append-only store of accepted moves, one list per match.
#[async_trait]
pub trait MoveRepository: Send + Sync {
    async fn append_move(&self, record: &MoveRecord) -> Result<(), MoveRepositoryError>;

    async fn moves_for_match(&self, match_id: &str)
        -> Result<Vec<MoveRecord>, MoveRepositoryError>;
}

pub struct InMemoryMoveRepository {
    items: Mutex<HashMap<String, Vec<MoveRecord>>>,
}

impl InMemoryMoveRepository {
    pub fn new() -> Self {
        InMemoryMoveRepository {
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMoveRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MoveRepository for InMemoryMoveRepository {
    async fn append_move(&self, record: &MoveRecord) -> Result<(), MoveRepositoryError> {
        let mut items = self.items.lock().unwrap();
        items
            .entry(record.match_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn moves_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<MoveRecord>, MoveRepositoryError> {
        let items = self.items.lock().unwrap();
        Ok(items.get(match_id).cloned().unwrap_or_default())
    }
}
