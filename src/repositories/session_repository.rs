use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::match_session::MatchSession;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;

/// Durable record store for match sessions. The coordinator writes through to
/// it but keeps live decisions on in-memory state.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &MatchSession) -> Result<(), SessionRepositoryError>;

    async fn update_session(&self, session: &MatchSession) -> Result<(), SessionRepositoryError>;

    async fn get_session(&self, id: &str) -> Result<Option<MatchSession>, SessionRepositoryError>;
}

pub struct InMemorySessionRepository {
    items: Mutex<HashMap<String, MatchSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        InMemorySessionRepository {
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session(&self, session: &MatchSession) -> Result<(), SessionRepositoryError> {
        let mut items = self.items.lock().unwrap();
        items.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &MatchSession) -> Result<(), SessionRepositoryError> {
        let mut items = self.items.lock().unwrap();
        if !items.contains_key(&session.id) {
            return Err(SessionRepositoryError::Backend(format!(
                "unknown session: {}",
                session.id
            )));
        }
        items.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<MatchSession>, SessionRepositoryError> {
        let items = self.items.lock().unwrap();
        Ok(items.get(id).cloned())
    }
}
