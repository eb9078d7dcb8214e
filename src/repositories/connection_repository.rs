use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

/// user ↔ transport-connection binding. A reconnect rebinds the user to the
/// new connection id.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn bind(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removes the binding for a connection, returning the user that was
    /// bound to it. Stale connection ids (already rebound) return `None`.
    async fn unbind_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    async fn connection_for(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    async fn user_for(
        &self,
        connection_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Default)]
struct Bindings {
    by_user: HashMap<String, String>,
    by_connection: HashMap<String, String>,
}

pub struct InMemoryConnectionRepository {
    bindings: Mutex<Bindings>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        InMemoryConnectionRepository {
            bindings: Mutex::new(Bindings::default()),
        }
    }
}

impl Default for InMemoryConnectionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn bind(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut bindings = self.bindings.lock().unwrap();
        if let Some(old) = bindings
            .by_user
            .insert(user_id.to_string(), connection_id.to_string())
        {
            bindings.by_connection.remove(&old);
        }
        bindings
            .by_connection
            .insert(connection_id.to_string(), user_id.to_string());
        Ok(())
    }

    async fn unbind_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut bindings = self.bindings.lock().unwrap();
        let user = bindings.by_connection.remove(connection_id);
        if let Some(user_id) = &user {
            // Only drop the user-side binding if it still points here; a
            // reconnect may have rebound the user already.
            if bindings.by_user.get(user_id).map(|c| c.as_str()) == Some(connection_id) {
                bindings.by_user.remove(user_id);
            }
        }
        Ok(user)
    }

    async fn connection_for(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let bindings = self.bindings.lock().unwrap();
        Ok(bindings.by_user.get(user_id).cloned())
    }

    async fn user_for(
        &self,
        connection_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let bindings = self.bindings.lock().unwrap();
        Ok(bindings.by_connection.get(connection_id).cloned())
    }
}
