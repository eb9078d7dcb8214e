use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::events::{ClientEvent, ServerEvent};
use crate::models::move_record::MoveInput;
use crate::models::participant::PlayerRef;
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::services::errors::session_service_errors::SessionServiceError;
use crate::services::liveness_service::LivenessService;
use crate::services::queue_service::QueueService;
use crate::services::session_service::SessionService;
use crate::transport::Transport;

/// Boundary between the realtime channel and the services. Raw payloads are
/// validated into the closed event protocol here; malformed input is dropped
/// with a log and never reaches the coordinator.
pub struct Gateway {
    queue: Arc<QueueService>,
    sessions: Arc<SessionService>,
    liveness: Arc<LivenessService>,
    transport: Arc<dyn Transport>,
}

impl Gateway {
    pub fn new(
        queue: Arc<QueueService>,
        sessions: Arc<SessionService>,
        liveness: Arc<LivenessService>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Gateway {
            queue,
            sessions,
            liveness,
            transport,
        }
    }

    pub async fn handle_connect(&self, user_id: &str, connection_id: &str) {
        self.liveness.handle_connect(user_id, connection_id).await;
    }

    pub async fn handle_disconnect(&self, connection_id: &str) {
        self.liveness.handle_disconnect(connection_id).await;
    }

    pub async fn handle_message(&self, connection_id: &str, raw: &str) {
        let event: ClientEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping malformed event from {}: {}", connection_id, e);
                return;
            }
        };
        debug!("event from {}: {:?}", connection_id, event);

        match event {
            ClientEvent::JoinQueue {
                user_id,
                category,
                time_control_ms,
                with_bot,
            } => {
                let result = self
                    .queue
                    .join(&user_id, &category, time_control_ms, with_bot, connection_id)
                    .await;
                if let Err(QueueServiceError::Session(e)) = result {
                    self.reply_error(connection_id, &e.to_string()).await;
                }
            }
            ClientEvent::LeaveQueue { user_id, category } => {
                self.queue.leave(&user_id, &category);
            }
            ClientEvent::SubscribeToMatch { match_id } => {
                if let Err(e) = self.sessions.subscribe(&match_id, connection_id).await {
                    self.reply_error(connection_id, &e.to_string()).await;
                }
            }
            ClientEvent::Move {
                match_id,
                user_id,
                from,
                to,
                promotion,
            } => {
                let mv = MoveInput {
                    from,
                    to,
                    promotion,
                };
                let mover = PlayerRef::human(&user_id);
                match self.sessions.apply_move(&match_id, &mover, mv).await {
                    Ok(()) => {}
                    // Stale actions on a finished match are no-op successes.
                    Err(SessionServiceError::AlreadyEnded(_)) => {
                        debug!("stale move for ended match {}", match_id);
                    }
                    Err(e) => self.reply_error(connection_id, &e.to_string()).await,
                }
            }
            ClientEvent::Resign { match_id, user_id } => {
                match self.sessions.resign(&match_id, &user_id).await {
                    Ok(()) => {}
                    Err(SessionServiceError::AlreadyEnded(_)) => {
                        debug!("stale resignation for ended match {}", match_id);
                    }
                    Err(e) => self.reply_error(connection_id, &e.to_string()).await,
                }
            }
            ClientEvent::Ping => {
                if let Err(e) = self.transport.emit(connection_id, &ServerEvent::Pong).await {
                    warn!("pong failed for {}: {}", connection_id, e);
                }
            }
        }
    }

    async fn reply_error(&self, connection_id: &str, message: &str) {
        let event = ServerEvent::Error {
            message: message.to_string(),
        };
        if let Err(e) = self.transport.emit(connection_id, &event).await {
            warn!("error reply failed for {}: {}", connection_id, e);
        }
    }
}
