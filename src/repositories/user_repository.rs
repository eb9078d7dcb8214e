use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::user::UserProfile;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str)
        -> Result<Option<UserProfile>, UserRepositoryError>;

    async fn put_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError>;

    /// Profiles whose last completed match is older than the threshold.
    async fn list_inactive(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<UserProfile>, UserRepositoryError>;
}

pub struct InMemoryUserRepository {
    items: Mutex<HashMap<String, UserProfile>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        InMemoryUserRepository {
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfile>, UserRepositoryError> {
        let items = self.items.lock().unwrap();
        Ok(items.get(user_id).cloned())
    }

    async fn put_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError> {
        let mut items = self.items.lock().unwrap();
        items.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn list_inactive(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<UserProfile>, UserRepositoryError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .values()
            .filter(|p| p.last_match_at < threshold)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn list_inactive_filters_by_last_match() {
        let repo = InMemoryUserRepository::new();
        let now = Utc::now();
        repo.put_profile(&UserProfile::new("fresh", 1500.0, 350.0, now))
            .await
            .unwrap();
        repo.put_profile(&UserProfile::new(
            "stale",
            1500.0,
            300.0,
            now - Duration::days(40),
        ))
        .await
        .unwrap();

        let inactive = repo.list_inactive(now - Duration::days(30)).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].user_id, "stale");
    }
}
