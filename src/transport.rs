use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::models::events::ServerEvent;

#[derive(Debug)]
pub enum TransportError {
    Send(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Send(msg) => write!(f, "Send error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Room-based publish/subscribe channel keyed by session id. Matches join
/// connections into a room and broadcast to it; direct emits address one
/// connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn join(&self, room: &str, connection_id: &str) -> Result<(), TransportError>;

    async fn emit(&self, connection_id: &str, event: &ServerEvent) -> Result<(), TransportError>;

    async fn emit_room(&self, room: &str, event: &ServerEvent) -> Result<(), TransportError>;
}

#[derive(Default)]
struct ChannelState {
    rooms: HashMap<String, HashSet<String>>,
    peers: HashMap<String, UnboundedSender<ServerEvent>>,
}

/// In-process transport over unbounded channels. Each registered connection
/// gets a receiver; disconnected peers are skipped on emit.
pub struct ChannelTransport {
    state: Mutex<ChannelState>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        ChannelTransport {
            state: Mutex::new(ChannelState::default()),
        }
    }

    pub fn register(&self, connection_id: &str) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.peers.insert(connection_id.to_string(), tx);
        rx
    }

    pub fn disconnect(&self, connection_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.peers.remove(connection_id);
        for members in state.rooms.values_mut() {
            members.remove(connection_id);
        }
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn join(&self, room: &str, connection_id: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());
        Ok(())
    }

    async fn emit(&self, connection_id: &str, event: &ServerEvent) -> Result<(), TransportError> {
        let state = self.state.lock().unwrap();
        match state.peers.get(connection_id) {
            Some(tx) => tx
                .send(event.clone())
                .map_err(|e| TransportError::Send(e.to_string())),
            None => {
                debug!("connection {} is gone, dropping event", connection_id);
                Ok(())
            }
        }
    }

    async fn emit_room(&self, room: &str, event: &ServerEvent) -> Result<(), TransportError> {
        let state = self.state.lock().unwrap();
        if let Some(members) = state.rooms.get(room) {
            for connection_id in members {
                if let Some(tx) = state.peers.get(connection_id) {
                    // A closed receiver only means that peer left.
                    let _ = tx.send(event.clone());
                }
            }
        }
        Ok(())
    }
}
