use serde::{Deserialize, Serialize};

/// A seat at the board: either a human identified by user id, or the built-in
/// bot. Move application treats both uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlayerRef {
    Human { user_id: String },
    Bot,
}

impl PlayerRef {
    pub fn human(user_id: &str) -> Self {
        PlayerRef::Human {
            user_id: user_id.to_string(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            PlayerRef::Human { user_id } => Some(user_id),
            PlayerRef::Bot => None,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, PlayerRef::Bot)
    }
}

impl std::fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerRef::Human { user_id } => write!(f, "{}", user_id),
            PlayerRef::Bot => write!(f, "bot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_exposes_user_id() {
        let player = PlayerRef::human("alice");
        assert_eq!(player.user_id(), Some("alice"));
        assert!(!player.is_bot());
    }

    #[test]
    fn bot_has_no_user_id() {
        assert_eq!(PlayerRef::Bot.user_id(), None);
        assert!(PlayerRef::Bot.is_bot());
    }

    #[test]
    fn serialization_is_tagged() {
        let serialized = serde_json::to_string(&PlayerRef::human("alice")).unwrap();
        assert!(serialized.contains("\"kind\":\"human\""));
        assert!(serialized.contains("\"user_id\":\"alice\""));

        let bot = serde_json::to_string(&PlayerRef::Bot).unwrap();
        assert_eq!(bot, "{\"kind\":\"bot\"}");
    }
}
