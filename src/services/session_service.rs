use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::engine::rules::RulesEngine;
use crate::models::events::{ServerEvent, UpdateKind};
use crate::models::match_session::{EndReason, MatchSession, Outcome, Side};
use crate::models::move_record::{MoveInput, MoveRecord};
use crate::models::participant::PlayerRef;
use crate::repositories::connection_repository::ConnectionRepository;
use crate::repositories::move_repository::MoveRepository;
use crate::repositories::session_repository::SessionRepository;
use crate::services::bot_service::BotService;
use crate::services::errors::session_service_errors::SessionServiceError;
use crate::services::rating_service::RatingService;
use crate::transport::Transport;

pub const DEFAULT_TIME_CONTROL_MS: i64 = 300_000;

/// Owns one state machine per active match. Every mutating operation on a
/// match runs under that match's own lock, so a human move, an in-flight bot
/// move, and a timeout check can never interleave on the same session. There
/// is no lock spanning matches.
///
/// The registry is the source of truth for live decisions; the repositories
/// are written through for durability. A storage failure is logged and play
/// continues on in-memory state.
pub struct SessionService {
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<MatchSession>>>>,
    active_by_user: Mutex<HashMap<String, String>>,
    session_repo: Arc<dyn SessionRepository>,
    move_repo: Arc<dyn MoveRepository>,
    rules: Arc<dyn RulesEngine>,
    rating: Arc<RatingService>,
    bot: Arc<BotService>,
    transport: Arc<dyn Transport>,
    connections: Arc<dyn ConnectionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        move_repo: Arc<dyn MoveRepository>,
        rules: Arc<dyn RulesEngine>,
        rating: Arc<RatingService>,
        bot: Arc<BotService>,
        transport: Arc<dyn Transport>,
        connections: Arc<dyn ConnectionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SessionService {
            sessions: Mutex::new(HashMap::new()),
            active_by_user: Mutex::new(HashMap::new()),
            session_repo,
            move_repo,
            rules,
            rating,
            bot,
            transport,
            connections,
            clock,
        }
    }

    /// Allocates and announces a new match. The first participant takes the
    /// white side. Refused if either human already has a non-ended match.
    pub async fn create_match(
        &self,
        white: PlayerRef,
        black: PlayerRef,
        time_control_ms: Option<i64>,
        category: &str,
        is_bot_match: bool,
    ) -> Result<MatchSession, SessionServiceError> {
        let time_control = time_control_ms.unwrap_or(DEFAULT_TIME_CONTROL_MS);
        let session = MatchSession::new(
            white.clone(),
            black.clone(),
            category,
            time_control,
            is_bot_match,
            self.clock.now(),
        );

        {
            // One lock scope so two concurrent creations for the same user
            // cannot both pass the check.
            let mut active = self.active_by_user.lock().unwrap();
            for player in [&white, &black] {
                if let Some(user_id) = player.user_id() {
                    if active.contains_key(user_id) {
                        return Err(SessionServiceError::ActiveMatchExists(user_id.to_string()));
                    }
                }
            }
            for player in [&white, &black] {
                if let Some(user_id) = player.user_id() {
                    active.insert(user_id.to_string(), session.id.clone());
                }
            }
        }

        self.sessions.lock().unwrap().insert(
            session.id.clone(),
            Arc::new(tokio::sync::Mutex::new(session.clone())),
        );

        if let Err(e) = self.session_repo.create_session(&session).await {
            error!("failed to persist new match {}: {}", session.id, e);
        }

        for player in [&white, &black] {
            if let Some(user_id) = player.user_id() {
                match self.connections.connection_for(user_id).await {
                    Ok(Some(connection_id)) => {
                        if let Err(e) = self.transport.join(&session.id, &connection_id).await {
                            warn!("could not join {} to match room: {}", user_id, e);
                        }
                    }
                    Ok(None) => debug!("{} not connected at match start", user_id),
                    Err(e) => warn!("connection lookup failed for {}: {}", user_id, e),
                }
            }
        }

        let started = ServerEvent::MatchStarted {
            match_id: session.id.clone(),
            white,
            black,
            category: category.to_string(),
            time_control_ms: time_control,
        };
        if let Err(e) = self.transport.emit_room(&session.id, &started).await {
            warn!("match start broadcast failed: {}", e);
        }

        info!(
            "match {} started ({} vs {}, {} ms, category {})",
            session.id, session.white, session.black, time_control, category
        );
        Ok(session)
    }

    /// Applies one move. The mover's clock is settled first: if it has
    /// already run out, the match ends in a timeout and the move is
    /// discarded, even if it would have been legal.
    pub async fn apply_move(
        self: &Arc<Self>,
        match_id: &str,
        mover: &PlayerRef,
        mv: MoveInput,
    ) -> Result<(), SessionServiceError> {
        let entry = self.session_arc(match_id)?;
        let mut session = entry.lock().await;

        if !session.is_active() {
            return Err(SessionServiceError::AlreadyEnded(match_id.to_string()));
        }
        let side = session
            .side_of(mover)
            .ok_or_else(|| SessionServiceError::Validation(format!(
                "{} is not a participant of match {}",
                mover, match_id
            )))?;
        if side != session.turn {
            return Err(SessionServiceError::IllegalMove("not your turn".to_string()));
        }

        let now = self.clock.now();
        let elapsed = (now - session.turn_started_at).num_milliseconds().max(0);
        let candidate = session.remaining_ms(side) - elapsed;
        if candidate <= 0 {
            info!(
                "clock expired for {:?} in match {}, discarding pending move",
                side, match_id
            );
            self.expire(&mut session).await;
            return Ok(());
        }

        let verdict = self.rules.apply_move(&session.position, &mv)?;

        let record = MoveRecord::new(
            match_id,
            mover.clone(),
            &verdict.notation,
            &verdict.new_position,
            now,
        );
        if let Err(e) = self.move_repo.append_move(&record).await {
            error!("failed to persist move for match {}: {}", match_id, e);
        }

        session.position = verdict.new_position.clone();
        session.set_remaining_ms(side, candidate);
        session.turn = side.opposite();
        session.turn_started_at = now;
        session.updated_at = now;

        if verdict.is_checkmate {
            session.finish(EndReason::Checkmate, Outcome::from(side), now);
        } else if verdict.is_stalemate {
            session.finish(EndReason::Stalemate, Outcome::Draw, now);
        } else if verdict.is_draw {
            session.finish(EndReason::Draw, Outcome::Draw, now);
        }

        if session.is_active() {
            if let Err(e) = self.session_repo.update_session(&session).await {
                error!("failed to persist match {}: {}", match_id, e);
            }
        } else {
            self.complete_end(&session).await;
        }

        let event = ServerEvent::Move {
            match_id: match_id.to_string(),
            player: mover.clone(),
            notation: record.notation,
            position: session.position.clone(),
            is_check: verdict.is_check,
            turn: session.turn,
            remaining_white_ms: session.remaining_white_ms,
            remaining_black_ms: session.remaining_black_ms,
            end_reason: session.end_reason,
            winner: session.winner,
        };
        if let Err(e) = self.transport.emit_room(match_id, &event).await {
            warn!("move broadcast failed for match {}: {}", match_id, e);
        }

        let bot_to_move =
            session.is_active() && session.is_bot_match && session.player(session.turn).is_bot();
        if bot_to_move {
            let position = session.position.clone();
            let id = session.id.clone();
            drop(session);
            self.schedule_bot_move(id, position);
        }

        Ok(())
    }

    /// Ends the match in favour of the opponent. Not an error if the user is
    /// a stranger to the match — logged and ignored.
    pub async fn resign(&self, match_id: &str, user_id: &str) -> Result<(), SessionServiceError> {
        let entry = self.session_arc(match_id)?;
        let mut session = entry.lock().await;

        if !session.is_active() {
            return Err(SessionServiceError::AlreadyEnded(match_id.to_string()));
        }
        let side = match session.side_of_user(user_id) {
            Some(side) => side,
            None => {
                warn!("{} is not a participant of match {}, ignoring resignation", user_id, match_id);
                return Ok(());
            }
        };

        let winner = Outcome::from(side.opposite());
        session.finish(EndReason::Resignation, winner, self.clock.now());
        info!("{} resigned match {}, winner {:?}", user_id, match_id, winner);
        self.complete_end(&session).await;

        let event = ServerEvent::Updates {
            match_id: match_id.to_string(),
            kind: UpdateKind::Resignation,
            winner,
        };
        if let Err(e) = self.transport.emit_room(match_id, &event).await {
            warn!("resignation broadcast failed for match {}: {}", match_id, e);
        }
        Ok(())
    }

    /// Joins a connection to the match room and replays the current state
    /// plus move history. Touching the match also settles an already-expired
    /// clock (lazy timeout detection).
    pub async fn subscribe(
        &self,
        match_id: &str,
        connection_id: &str,
    ) -> Result<(), SessionServiceError> {
        let entry = self.session_arc(match_id)?;
        let mut session = entry.lock().await;

        if session.is_active() {
            let elapsed = (self.clock.now() - session.turn_started_at)
                .num_milliseconds()
                .max(0);
            if session.remaining_ms(session.turn) - elapsed <= 0 {
                info!("match {} found expired on subscribe", match_id);
                self.expire(&mut session).await;
            }
        }

        if let Err(e) = self.transport.join(match_id, connection_id).await {
            warn!("could not join {} to match room: {}", connection_id, e);
        }

        self.emit_details(&session).await;
        Ok(())
    }

    /// Rebroadcasts the current session state and move history to the match
    /// room, e.g. after a liveness-driven resignation.
    pub async fn broadcast_state(&self, match_id: &str) -> Result<(), SessionServiceError> {
        let entry = self.session_arc(match_id)?;
        let session = entry.lock().await;
        self.emit_details(&session).await;
        Ok(())
    }

    async fn emit_details(&self, session: &MatchSession) {
        let moves = match self.move_repo.moves_for_match(&session.id).await {
            Ok(moves) => moves,
            Err(e) => {
                error!("move history load failed for match {}: {}", session.id, e);
                Vec::new()
            }
        };

        let details = ServerEvent::MatchDetails {
            session: session.clone(),
            moves,
        };
        if let Err(e) = self.transport.emit_room(&session.id, &details).await {
            warn!("details broadcast failed for match {}: {}", session.id, e);
        }
    }

    pub fn active_match_for(&self, user_id: &str) -> Option<String> {
        self.active_by_user.lock().unwrap().get(user_id).cloned()
    }

    /// Current in-memory state of a match, if known.
    pub async fn snapshot(&self, match_id: &str) -> Option<MatchSession> {
        let entry = {
            let sessions = self.sessions.lock().unwrap();
            sessions.get(match_id).cloned()
        }?;
        let session = entry.lock().await;
        Some(session.clone())
    }

    fn session_arc(
        &self,
        match_id: &str,
    ) -> Result<Arc<tokio::sync::Mutex<MatchSession>>, SessionServiceError> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(match_id)
            .cloned()
            .ok_or_else(|| SessionServiceError::NotFound(match_id.to_string()))
    }

    /// Settles an expired clock: the side to move loses on time. Must be
    /// called with the session lock held and the session still active.
    async fn expire(&self, session: &mut MatchSession) {
        let loser = session.turn;
        let winner = Outcome::from(loser.opposite());
        session.set_remaining_ms(loser, 0);
        session.finish(EndReason::Timeout, winner, self.clock.now());
        self.complete_end(session).await;

        let event = ServerEvent::Updates {
            match_id: session.id.clone(),
            kind: UpdateKind::TimeOut,
            winner,
        };
        if let Err(e) = self.transport.emit_room(&session.id, &event).await {
            warn!("timeout broadcast failed for match {}: {}", session.id, e);
        }
    }

    /// Post-termination bookkeeping: release the players, persist the final
    /// state, and apply ratings for human matches.
    async fn complete_end(&self, session: &MatchSession) {
        {
            let mut active = self.active_by_user.lock().unwrap();
            for player in [&session.white, &session.black] {
                if let Some(user_id) = player.user_id() {
                    if active.get(user_id) == Some(&session.id) {
                        active.remove(user_id);
                    }
                }
            }
        }

        if let Err(e) = self.session_repo.update_session(session).await {
            error!("failed to persist final state of match {}: {}", session.id, e);
        }

        if !session.is_bot_match {
            self.rating.handle_match_end(session).await;
        }

        info!(
            "match {} ended: {:?}, winner {:?}",
            session.id, session.end_reason, session.winner
        );
    }

    /// Fires the move generator for the bot's turn without holding the match
    /// lock. The reply re-enters `apply_move` like any other move; failures
    /// leave the match untouched.
    fn schedule_bot_move(self: &Arc<Self>, match_id: String, position: String) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            match service.bot.request_move(&position).await {
                Ok(mv) => {
                    if let Err(e) = service.apply_move(&match_id, &PlayerRef::Bot, mv).await {
                        warn!("bot move rejected for match {}: {}", match_id, e);
                    }
                }
                Err(e) => {
                    warn!(
                        "move generator failed for match {}, bot skips this turn: {}",
                        match_id, e
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::rules::ChessRules;
    use crate::repositories::connection_repository::InMemoryConnectionRepository;
    use crate::repositories::move_repository::InMemoryMoveRepository;
    use crate::repositories::session_repository::InMemorySessionRepository;
    use crate::repositories::user_repository::InMemoryUserRepository;
    use crate::transport::ChannelTransport;
    use chrono::Utc;

    struct Fixture {
        service: Arc<SessionService>,
        moves: Arc<InMemoryMoveRepository>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc::now());
        let users = Arc::new(InMemoryUserRepository::new());
        let rating = Arc::new(RatingService::new(users, Arc::new(clock.clone())));
        let moves = Arc::new(InMemoryMoveRepository::new());
        let service = Arc::new(SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            moves.clone(),
            Arc::new(ChessRules::new()),
            rating,
            Arc::new(BotService::new(None)),
            Arc::new(ChannelTransport::new()),
            Arc::new(InMemoryConnectionRepository::new()),
            Arc::new(clock.clone()),
        ));
        Fixture {
            service,
            moves,
            clock,
        }
    }

    async fn start_match(fixture: &Fixture) -> MatchSession {
        fixture
            .service
            .create_match(
                PlayerRef::human("alice"),
                PlayerRef::human("bob"),
                Some(300_000),
                "blitz",
                false,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn moves_alternate_turns_and_burn_clock() {
        let fixture = fixture();
        let session = start_match(&fixture).await;

        fixture.clock.advance_ms(2_000);
        fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("alice"), MoveInput::new("e2", "e4"))
            .await
            .unwrap();

        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.turn, Side::Black);
        assert_eq!(state.remaining_white_ms, 298_000);
        assert_eq!(state.remaining_black_ms, 300_000);

        fixture.clock.advance_ms(3_000);
        fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("bob"), MoveInput::new("e7", "e5"))
            .await
            .unwrap();

        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.turn, Side::White);
        assert_eq!(state.remaining_black_ms, 297_000);

        let history = fixture.moves.moves_for_match(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0].player, history[1].player);
    }

    #[tokio::test]
    async fn out_of_turn_and_illegal_moves_leave_state_alone() {
        let fixture = fixture();
        let session = start_match(&fixture).await;

        let err = fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("bob"), MoveInput::new("e7", "e5"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionServiceError::IllegalMove(_)));

        let err = fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("alice"), MoveInput::new("e2", "e5"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionServiceError::IllegalMove(_)));

        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.turn, Side::White);
        assert_eq!(state.position, crate::models::match_session::STARTING_POSITION);
        assert!(fixture.moves.moves_for_match(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_clock_beats_the_arriving_move() {
        let fixture = fixture();
        let session = start_match(&fixture).await;

        fixture.clock.advance_ms(300_000);
        fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("alice"), MoveInput::new("e2", "e4"))
            .await
            .unwrap();

        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.status, crate::models::match_session::MatchStatus::Ended);
        assert_eq!(state.end_reason, Some(EndReason::Timeout));
        assert_eq!(state.winner, Some(Outcome::Black));
        assert_eq!(state.remaining_white_ms, 0);
        // The pending move was discarded, not recorded.
        assert_eq!(state.position, crate::models::match_session::STARTING_POSITION);
        assert!(fixture.moves.moves_for_match(&session.id).await.unwrap().is_empty());

        // Termination is idempotent: later actions are stale no-ops.
        let err = fixture
            .service
            .apply_move(&session.id, &PlayerRef::human("bob"), MoveInput::new("e7", "e5"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionServiceError::AlreadyEnded(_)));
        let err = fixture.service.resign(&session.id, "alice").await.unwrap_err();
        assert!(matches!(err, SessionServiceError::AlreadyEnded(_)));
        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.end_reason, Some(EndReason::Timeout));
    }

    #[tokio::test]
    async fn resignation_awards_the_opponent() {
        let fixture = fixture();
        let session = start_match(&fixture).await;

        fixture.service.resign(&session.id, "bob").await.unwrap();

        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
        assert_eq!(state.winner, Some(Outcome::White));
        assert_eq!(fixture.service.active_match_for("alice"), None);
        assert_eq!(fixture.service.active_match_for("bob"), None);
    }

    #[tokio::test]
    async fn stranger_resignation_is_ignored() {
        let fixture = fixture();
        let session = start_match(&fixture).await;

        fixture.service.resign(&session.id, "mallory").await.unwrap();
        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert!(state.is_active());
    }

    #[tokio::test]
    async fn one_active_match_per_human() {
        let fixture = fixture();
        let _session = start_match(&fixture).await;

        let err = fixture
            .service
            .create_match(
                PlayerRef::human("alice"),
                PlayerRef::human("carol"),
                None,
                "blitz",
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionServiceError::ActiveMatchExists(user) if user == "alice"));
        // Carol was not registered by the failed attempt.
        assert_eq!(fixture.service.active_match_for("carol"), None);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let fixture = fixture();
        let err = fixture
            .service
            .apply_move("nope", &PlayerRef::human("alice"), MoveInput::new("e2", "e4"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_move_and_timeout_touch_end_exactly_once() {
        let fixture = fixture();
        let session = start_match(&fixture).await;
        fixture.clock.advance_ms(301_000);

        // A move racing a subscribe-triggered timeout check: both settle the
        // clock, only one records the end.
        let move_call = {
            let service = Arc::clone(&fixture.service);
            let id = session.id.clone();
            async move {
                service
                    .apply_move(&id, &PlayerRef::human("alice"), MoveInput::new("e2", "e4"))
                    .await
            }
        };
        let subscribe_call = {
            let service = Arc::clone(&fixture.service);
            let id = session.id.clone();
            async move { service.subscribe(&id, "conn-x").await }
        };
        let (move_result, subscribe_result) = tokio::join!(move_call, subscribe_call);

        // Whichever ran second saw an ended match; neither produced a second
        // end reason.
        assert!(move_result.is_ok() || matches!(move_result, Err(SessionServiceError::AlreadyEnded(_))));
        assert!(subscribe_result.is_ok());
        let state = fixture.service.snapshot(&session.id).await.unwrap();
        assert_eq!(state.end_reason, Some(EndReason::Timeout));
        assert_eq!(state.winner, Some(Outcome::Black));
    }
}
