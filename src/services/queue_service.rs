use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::events::ServerEvent;
use crate::models::participant::PlayerRef;
use crate::models::queue::QueueEntry;
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::services::errors::session_service_errors::SessionServiceError;
use crate::services::rating_service::RatingService;
use crate::services::session_service::SessionService;
use crate::transport::Transport;

/// Holds waiting players and pairs them on a fixed period. Pairing is
/// FIFO within a `(category, time control)` bucket — no rating-aware
/// matching.
pub struct QueueService {
    entries: Mutex<Vec<QueueEntry>>,
    sessions: Arc<SessionService>,
    rating: Arc<RatingService>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    default_time_control_ms: i64,
}

impl QueueService {
    pub fn new(
        sessions: Arc<SessionService>,
        rating: Arc<RatingService>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        default_time_control_ms: i64,
    ) -> Self {
        QueueService {
            entries: Mutex::new(Vec::new()),
            sessions,
            rating,
            transport,
            clock,
            default_time_control_ms,
        }
    }

    /// Adds a queue entry. A duplicate `(user, category, time control)` join
    /// is a no-op. `wants_bot` bypasses the queue entirely and starts a bot
    /// match right away.
    pub async fn join(
        &self,
        user_id: &str,
        category: &str,
        time_control_ms: Option<i64>,
        wants_bot: bool,
        connection_id: &str,
    ) -> Result<(), QueueServiceError> {
        let time_control = time_control_ms.unwrap_or(self.default_time_control_ms);

        if let Err(e) = self.rating.ensure_profile(user_id).await {
            warn!("could not ensure rating profile for {}: {}", user_id, e);
        }

        if wants_bot {
            self.sessions
                .create_match(
                    PlayerRef::human(user_id),
                    PlayerRef::Bot,
                    Some(time_control),
                    category,
                    true,
                )
                .await?;
            return Ok(());
        }

        let entry = QueueEntry::new(user_id, category, time_control, false, self.clock.now());
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.iter().any(|e| e.same_key(&entry)) {
                debug!("{} already queued for {} @ {} ms", user_id, category, time_control);
                return Ok(());
            }
            entries.push(entry.clone());
            info!(
                "{} joined the {} queue ({} ms), {} waiting",
                user_id,
                category,
                time_control,
                entries.len()
            );
        }

        let joined = ServerEvent::JoinedQueue {
            user_id: user_id.to_string(),
            category: category.to_string(),
            time_control_ms: time_control,
        };
        if let Err(e) = self.transport.emit(connection_id, &joined).await {
            warn!("join confirmation failed for {}: {}", user_id, e);
        }
        Ok(())
    }

    /// Removes the user's entries for a category. Absent entries are fine.
    pub fn leave(&self, user_id: &str, category: &str) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| !(e.user_id == user_id && e.category == category));
        if entries.len() < before {
            info!("{} left the {} queue", user_id, category);
        }
    }

    /// Disconnect hook: drops every entry the user holds.
    pub fn remove_user(&self, user_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.user_id != user_id);
        if entries.len() < before {
            info!("removed {} from all queues", user_id);
        }
    }

    /// First waiting entry for a user, if any. Used to re-announce queue
    /// membership on reconnect.
    pub fn pending_entry(&self, user_id: &str) -> Option<QueueEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|e| e.user_id == user_id).cloned()
    }

    pub fn waiting_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// One pairing pass: bucket by `(category, time control)`, pair the two
    /// longest-waiting entries while at least two remain, first-joined takes
    /// white. The unpaired remainder stays queued.
    pub async fn sweep(&self) {
        let pairs = {
            let mut entries = self.entries.lock().unwrap();
            let mut buckets: HashMap<(String, i64), Vec<QueueEntry>> = HashMap::new();
            for entry in entries.drain(..) {
                buckets.entry(entry.bucket()).or_default().push(entry);
            }

            let mut pairs = Vec::new();
            for (_, mut bucket) in buckets {
                bucket.sort_by_key(|e| e.joined_at);
                let mut iter = bucket.into_iter();
                loop {
                    match (iter.next(), iter.next()) {
                        (Some(first), Some(second)) => pairs.push((first, second)),
                        (Some(rest), None) => {
                            entries.push(rest);
                            break;
                        }
                        _ => break,
                    }
                }
            }
            pairs
        };

        for (white, black) in pairs {
            match self
                .sessions
                .create_match(
                    PlayerRef::human(&white.user_id),
                    PlayerRef::human(&black.user_id),
                    Some(white.time_control_ms),
                    &white.category,
                    false,
                )
                .await
            {
                Ok(session) => {
                    debug!(
                        "paired {} and {} into match {}",
                        white.user_id, black.user_id, session.id
                    );
                }
                Err(SessionServiceError::ActiveMatchExists(user)) => {
                    // The offender is dropped; the innocent side keeps its
                    // original place in the queue.
                    warn!("{} was paired while already in a match, dropping entry", user);
                    let mut entries = self.entries.lock().unwrap();
                    for entry in [white, black] {
                        if entry.user_id != user {
                            entries.push(entry);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "pairing {} and {} failed: {}",
                        white.user_id, black.user_id, e
                    );
                    let mut entries = self.entries.lock().unwrap();
                    entries.push(white);
                    entries.push(black);
                }
            }
        }
    }

    /// Runs the pairing sweep on a fixed period.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}
