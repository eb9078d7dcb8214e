use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::events::ServerEvent;
use crate::repositories::connection_repository::ConnectionRepository;
use crate::services::errors::session_service_errors::SessionServiceError;
use crate::services::queue_service::QueueService;
use crate::services::session_service::SessionService;
use crate::transport::Transport;

/// Tracks which user sits behind which transport connection and runs the
/// disconnect grace timers. A reconnect inside the grace window cancels the
/// pending resignation; past the window the match is resigned on the user's
/// behalf.
pub struct LivenessService {
    connections: Arc<dyn ConnectionRepository>,
    queue: Arc<QueueService>,
    sessions: Arc<SessionService>,
    transport: Arc<dyn Transport>,
    grace_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    grace_period: Duration,
}

impl LivenessService {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        queue: Arc<QueueService>,
        sessions: Arc<SessionService>,
        transport: Arc<dyn Transport>,
        grace_period: Duration,
    ) -> Self {
        LivenessService {
            connections,
            queue,
            sessions,
            transport,
            grace_timers: Mutex::new(HashMap::new()),
            grace_period,
        }
    }

    pub async fn handle_connect(&self, user_id: &str, connection_id: &str) {
        info!("{} connected as {}", user_id, connection_id);
        if let Err(e) = self.connections.bind(user_id, connection_id).await {
            warn!("binding {} failed: {}", user_id, e);
        }

        // Claiming the timer entry is what cancels the resignation; whichever
        // of reconnect and expiry claims it first wins.
        if let Some(handle) = self.grace_timers.lock().unwrap().remove(user_id) {
            handle.abort();
            info!("{} reconnected within the grace window", user_id);
        }

        if let Some(entry) = self.queue.pending_entry(user_id) {
            let joined = ServerEvent::JoinedQueue {
                user_id: entry.user_id.clone(),
                category: entry.category.clone(),
                time_control_ms: entry.time_control_ms,
            };
            if let Err(e) = self.transport.emit(connection_id, &joined).await {
                warn!("queue re-announcement failed for {}: {}", user_id, e);
            }
        }
    }

    pub async fn handle_disconnect(self: &Arc<Self>, connection_id: &str) {
        let user_id = match self.connections.unbind_connection(connection_id).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                debug!("disconnect of unbound connection {}", connection_id);
                return;
            }
            Err(e) => {
                warn!("unbinding {} failed: {}", connection_id, e);
                return;
            }
        };
        info!("{} disconnected", user_id);

        // Queue entries never survive a disconnect, active match or not; a
        // stale entry could otherwise be swept into a new match while the
        // player is gone.
        self.queue.remove_user(&user_id);

        let Some(match_id) = self.sessions.active_match_for(&user_id) else {
            return;
        };

        let service = Arc::clone(self);
        let user = user_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(service.grace_period).await;
            // The timer map is the arbitration point: if a reconnect claimed
            // this entry first, the resignation is off.
            if service.grace_timers.lock().unwrap().remove(&user).is_none() {
                return;
            }
            info!("grace period over for {}, resigning match {}", user, match_id);
            match service.sessions.resign(&match_id, &user).await {
                Ok(()) => {
                    // The room gets the full final state, not just the winner.
                    if let Err(e) = service.sessions.broadcast_state(&match_id).await {
                        warn!("state rebroadcast failed for match {}: {}", match_id, e);
                    }
                }
                Err(SessionServiceError::AlreadyEnded(_)) => {
                    debug!("match {} already over before forced resignation", match_id);
                }
                Err(e) => warn!("forced resignation failed for {}: {}", user, e),
            }
        });

        let mut timers = self.grace_timers.lock().unwrap();
        if let Some(old) = timers.insert(user_id, handle) {
            old.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::engine::rules::ChessRules;
    use crate::models::match_session::{EndReason, MatchStatus};
    use crate::models::participant::PlayerRef;
    use crate::repositories::connection_repository::InMemoryConnectionRepository;
    use crate::repositories::move_repository::InMemoryMoveRepository;
    use crate::repositories::session_repository::InMemorySessionRepository;
    use crate::repositories::user_repository::InMemoryUserRepository;
    use crate::services::bot_service::BotService;
    use crate::services::rating_service::RatingService;
    use crate::transport::ChannelTransport;
    use chrono::Utc;

    struct Fixture {
        liveness: Arc<LivenessService>,
        sessions: Arc<SessionService>,
        queue: Arc<QueueService>,
        transport: Arc<ChannelTransport>,
    }

    fn fixture(grace: Duration) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let users = Arc::new(InMemoryUserRepository::new());
        let rating = Arc::new(RatingService::new(users, clock.clone()));
        let transport = Arc::new(ChannelTransport::new());
        let connections = Arc::new(InMemoryConnectionRepository::new());
        let sessions = Arc::new(SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(InMemoryMoveRepository::new()),
            Arc::new(ChessRules::new()),
            rating.clone(),
            Arc::new(BotService::new(None)),
            transport.clone(),
            connections.clone(),
            clock.clone(),
        ));
        let queue = Arc::new(QueueService::new(
            sessions.clone(),
            rating,
            transport.clone(),
            clock,
            300_000,
        ));
        let liveness = Arc::new(LivenessService::new(
            connections,
            queue.clone(),
            sessions.clone(),
            transport.clone(),
            grace,
        ));
        Fixture {
            liveness,
            sessions,
            queue,
            transport,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_within_grace_keeps_the_match_alive() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture.liveness.handle_connect("bob", "conn-b1").await;
        let session = fixture
            .sessions
            .create_match(
                PlayerRef::human("alice"),
                PlayerRef::human("bob"),
                None,
                "blitz",
                false,
            )
            .await
            .unwrap();

        fixture.liveness.handle_disconnect("conn-a1").await;
        tokio::time::advance(Duration::from_secs(12)).await;
        fixture.liveness.handle_connect("alice", "conn-a2").await;
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        let state = fixture.sessions.snapshot(&session.id).await.unwrap();
        assert_eq!(state.status, MatchStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_the_grace_window_resigns_the_disconnector() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture.liveness.handle_connect("bob", "conn-b1").await;
        let session = fixture
            .sessions
            .create_match(
                PlayerRef::human("alice"),
                PlayerRef::human("bob"),
                None,
                "blitz",
                false,
            )
            .await
            .unwrap();

        fixture.liveness.handle_disconnect("conn-a1").await;
        tokio::time::sleep(Duration::from_secs(14)).await;

        let state = fixture.sessions.snapshot(&session.id).await.unwrap();
        assert_eq!(state.status, MatchStatus::Ended);
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
        assert_eq!(state.winner, Some(crate::models::match_session::Outcome::Black));

        // The late reconnect simply finds an ended match.
        fixture.liveness.handle_connect("alice", "conn-a2").await;
        let state = fixture.sessions.snapshot(&session.id).await.unwrap();
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_without_a_match_clears_queue_entries() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture
            .queue
            .join("alice", "blitz", None, false, "conn-a1")
            .await
            .unwrap();

        fixture.liveness.handle_disconnect("conn-a1").await;
        assert_eq!(fixture.queue.waiting_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_clears_queue_entries_despite_an_active_match() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture
            .queue
            .join("alice", "blitz", None, false, "conn-a1")
            .await
            .unwrap();
        fixture
            .sessions
            .create_match(PlayerRef::human("alice"), PlayerRef::Bot, None, "blitz", true)
            .await
            .unwrap();

        // The grace-timer branch must still drop the queue entry, or it
        // could be swept into a new match while alice is gone.
        fixture.liveness.handle_disconnect("conn-a1").await;
        assert_eq!(fixture.queue.waiting_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_resignation_rebroadcasts_the_final_state() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture.liveness.handle_connect("bob", "conn-b1").await;
        let session = fixture
            .sessions
            .create_match(
                PlayerRef::human("alice"),
                PlayerRef::human("bob"),
                None,
                "blitz",
                false,
            )
            .await
            .unwrap();
        let mut rx = fixture.transport.register("conn-b1");

        fixture.liveness.handle_disconnect("conn-a1").await;
        tokio::time::sleep(Duration::from_secs(14)).await;

        // The opponent sees the complete final state, not just the winner.
        let mut details = None;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::MatchDetails { session: state, .. } = event {
                details = Some(state);
            }
        }
        let state = details.expect("final state broadcast");
        assert_eq!(state.id, session.id);
        assert_eq!(state.status, MatchStatus::Ended);
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_user_is_reannounced_on_reconnect() {
        let fixture = fixture(Duration::from_secs(13));
        fixture.liveness.handle_connect("alice", "conn-a1").await;
        fixture
            .queue
            .join("alice", "blitz", None, false, "conn-a1")
            .await
            .unwrap();

        // Queue survives a reconnect race where the new connection arrives
        // before the old one drops.
        fixture.liveness.handle_connect("alice", "conn-a2").await;
        fixture.liveness.handle_disconnect("conn-a1").await;
        assert_eq!(fixture.queue.waiting_count(), 1);
    }
}
