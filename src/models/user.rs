use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user skill record. `rating` and `deviation` stay positive; the
/// deviation only decreases through completed matches and only increases
/// through the periodic inactivity job, capped at the initial deviation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub rating: f64,
    pub deviation: f64,
    pub last_match_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str, rating: f64, deviation: f64, last_match_at: DateTime<Utc>) -> Self {
        UserProfile {
            user_id: user_id.to_string(),
            rating,
            deviation,
            last_match_at,
        }
    }
}
