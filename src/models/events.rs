use serde::{Deserialize, Serialize};

use crate::models::{
    match_session::{EndReason, MatchSession, Outcome, Side},
    move_record::MoveRecord,
    participant::PlayerRef,
};

/// Inbound protocol: one closed variant per client action, validated at the
/// boundary before anything reaches the coordinator. Unknown or malformed
/// payloads fail deserialization and are dropped with a log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinQueue {
        user_id: String,
        category: String,
        time_control_ms: Option<i64>,
        #[serde(default)]
        with_bot: bool,
    },
    #[serde(rename_all = "camelCase")]
    LeaveQueue { user_id: String, category: String },
    #[serde(rename_all = "camelCase")]
    SubscribeToMatch { match_id: String },
    #[serde(rename_all = "camelCase")]
    Move {
        match_id: String,
        user_id: String,
        from: String,
        to: String,
        promotion: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Resign { match_id: String, user_id: String },
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    #[serde(rename = "time-out")]
    TimeOut,
    #[serde(rename = "resignation")]
    Resignation,
}

/// Outbound protocol over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    JoinedQueue {
        user_id: String,
        category: String,
        time_control_ms: i64,
    },
    #[serde(rename_all = "camelCase")]
    MatchStarted {
        match_id: String,
        white: PlayerRef,
        black: PlayerRef,
        category: String,
        time_control_ms: i64,
    },
    #[serde(rename_all = "camelCase")]
    MatchDetails {
        session: MatchSession,
        moves: Vec<MoveRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Move {
        match_id: String,
        player: PlayerRef,
        notation: String,
        position: String,
        is_check: bool,
        turn: Side,
        remaining_white_ms: i64,
        remaining_black_ms: i64,
        end_reason: Option<EndReason>,
        winner: Option<Outcome>,
    },
    #[serde(rename_all = "camelCase")]
    Updates {
        match_id: String,
        #[serde(rename = "type")]
        kind: UpdateKind,
        winner: Outcome,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_queue_deserializes_with_defaults() {
        let raw = r#"{"action":"joinQueue","userId":"alice","category":"blitz","timeControlMs":300000}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::JoinQueue {
                user_id,
                category,
                time_control_ms,
                with_bot,
            } => {
                assert_eq!(user_id, "alice");
                assert_eq!(category, "blitz");
                assert_eq!(time_control_ms, Some(300_000));
                assert!(!with_bot);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let raw = r#"{"action":"selfDestruct"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let raw = r#"{"action":"move","matchId":"m1","from":"e2"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn timeout_update_uses_wire_names() {
        let event = ServerEvent::Updates {
            match_id: "m1".to_string(),
            kind: UpdateKind::TimeOut,
            winner: Outcome::Black,
        };
        let serialized = serde_json::to_string(&event).unwrap();
        assert!(serialized.contains("\"event\":\"updates\""));
        assert!(serialized.contains("\"type\":\"time-out\""));
        assert!(serialized.contains("\"winner\":\"black\""));
    }
}
