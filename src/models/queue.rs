use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One waiting matchmaking entry. Unique per
/// `(user_id, category, time_control_ms)`; `joined_at` orders FIFO pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: String,
    pub category: String,
    pub time_control_ms: i64,
    pub wants_bot: bool,
    pub joined_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(
        user_id: &str,
        category: &str,
        time_control_ms: i64,
        wants_bot: bool,
        joined_at: DateTime<Utc>,
    ) -> Self {
        QueueEntry {
            user_id: user_id.to_string(),
            category: category.to_string(),
            time_control_ms,
            wants_bot,
            joined_at,
        }
    }

    /// Entries with the same key are duplicates: a second join is a no-op.
    pub fn same_key(&self, other: &QueueEntry) -> bool {
        self.user_id == other.user_id
            && self.category == other.category
            && self.time_control_ms == other.time_control_ms
    }

    /// Grouping key for the pairing sweep.
    pub fn bucket(&self) -> (String, i64) {
        (self.category.clone(), self.time_control_ms)
    }
}
