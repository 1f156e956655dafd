mod overview;
mod player;
mod round;

pub use overview::round_status;
pub use player::SubmitOutcome;
pub use round::RoundStarted;

use crate::config::GameConfig;
use crate::protocol::ServerMessage;
use crate::scenarios::ScenarioCatalog;
use crate::store::{MemoryStore, Store};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub catalog: Arc<ScenarioCatalog>,
    pub config: GameConfig,
    /// Push channel relayed to every WebSocket client
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, catalog: ScenarioCatalog, config: GameConfig) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            store,
            catalog: Arc::new(catalog),
            config,
            broadcast: tx,
        }
    }

    /// In-memory store with default catalog and timings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            ScenarioCatalog::default(),
            GameConfig::default(),
        )
    }

    /// Send a message to all connected clients
    pub fn broadcast_to_all(&self, msg: ServerMessage) {
        // No receivers connected is fine
        let _ = self.broadcast.send(msg);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
