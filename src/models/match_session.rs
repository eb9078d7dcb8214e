use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::participant::PlayerRef;

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    Draw,
    #[serde(rename = "time-out")]
    Timeout,
    Resignation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    White,
    Black,
    Draw,
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Outcome::White,
            Side::Black => Outcome::Black,
        }
    }
}

/// The central aggregate: one timed two-party match. Mutated exclusively
/// through the session coordinator; never deleted, only marked ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSession {
    pub id: String,
    pub white: PlayerRef,
    pub black: PlayerRef,
    pub position: String,
    pub turn: Side,
    pub remaining_white_ms: i64,
    pub remaining_black_ms: i64,
    pub turn_started_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub end_reason: Option<EndReason>,
    pub winner: Option<Outcome>,
    pub is_bot_match: bool,
    pub category: String,
    pub time_control_ms: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchSession {
    pub fn new(
        white: PlayerRef,
        black: PlayerRef,
        category: &str,
        time_control_ms: i64,
        is_bot_match: bool,
        now: DateTime<Utc>,
    ) -> Self {
        MatchSession {
            id: Uuid::new_v4().to_string(),
            white,
            black,
            position: STARTING_POSITION.to_string(),
            turn: Side::White,
            remaining_white_ms: time_control_ms,
            remaining_black_ms: time_control_ms,
            turn_started_at: now,
            status: MatchStatus::Active,
            end_reason: None,
            winner: None,
            is_bot_match,
            category: category.to_string(),
            time_control_ms,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn player(&self, side: Side) -> &PlayerRef {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn side_of(&self, player: &PlayerRef) -> Option<Side> {
        if &self.white == player {
            Some(Side::White)
        } else if &self.black == player {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn side_of_user(&self, user_id: &str) -> Option<Side> {
        self.side_of(&PlayerRef::human(user_id))
    }

    pub fn remaining_ms(&self, side: Side) -> i64 {
        match side {
            Side::White => self.remaining_white_ms,
            Side::Black => self.remaining_black_ms,
        }
    }

    pub fn set_remaining_ms(&mut self, side: Side, remaining: i64) {
        match side {
            Side::White => self.remaining_white_ms = remaining,
            Side::Black => self.remaining_black_ms = remaining,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    /// Marks the session ended. Write-once: returns false and leaves the
    /// session untouched if it has already ended.
    pub fn finish(&mut self, reason: EndReason, winner: Outcome, now: DateTime<Utc>) -> bool {
        if self.status == MatchStatus::Ended {
            return false;
        }
        self.status = MatchStatus::Ended;
        self.end_reason = Some(reason);
        self.winner = Some(winner);
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> MatchSession {
        MatchSession::new(
            PlayerRef::human("alice"),
            PlayerRef::human("bob"),
            "blitz",
            300_000,
            false,
            Utc::now(),
        )
    }

    #[test]
    fn new_session_seeds_clocks_and_turn() {
        let session = session();
        assert!(!session.id.is_empty());
        assert_eq!(session.position, STARTING_POSITION);
        assert_eq!(session.turn, Side::White);
        assert_eq!(session.remaining_white_ms, 300_000);
        assert_eq!(session.remaining_black_ms, 300_000);
        assert_eq!(session.status, MatchStatus::Active);
        assert!(session.end_reason.is_none());
        assert!(session.winner.is_none());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(session().id, session().id);
    }

    #[test]
    fn side_lookup() {
        let session = session();
        assert_eq!(session.side_of_user("alice"), Some(Side::White));
        assert_eq!(session.side_of_user("bob"), Some(Side::Black));
        assert_eq!(session.side_of_user("mallory"), None);
        assert_eq!(session.side_of(&PlayerRef::Bot), None);
    }

    #[test]
    fn finish_is_write_once() {
        let mut session = session();
        let now = Utc::now();
        assert!(session.finish(EndReason::Resignation, Outcome::Black, now));
        assert!(!session.finish(EndReason::Timeout, Outcome::White, now));
        assert_eq!(session.end_reason, Some(EndReason::Resignation));
        assert_eq!(session.winner, Some(Outcome::Black));
    }

    #[test]
    fn timeout_reason_serializes_hyphenated() {
        let serialized = serde_json::to_string(&EndReason::Timeout).unwrap();
        assert_eq!(serialized, "\"time-out\"");
    }

    #[test]
    fn round_trips_through_json() {
        let session = session();
        let serialized = serde_json::to_string(&session).unwrap();
        let deserialized: MatchSession = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.id, session.id);
        assert_eq!(deserialized.turn, session.turn);
        assert_eq!(deserialized.white, session.white);
    }
}
