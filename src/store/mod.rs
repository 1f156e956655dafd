//! Shared state store.
//!
//! All reads and writes of `gameState` and `players/<id>` go through the
//! [`Store`] trait so the game logic does not care whether it talks to the
//! in-memory store or a hosted Firebase database.

mod firebase;
mod memory;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

use crate::types::{GameState, Player, PlayerId, ScenarioId};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request timed out")]
    Timeout,

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store data could not be (de)serialized: {0}")]
    Serialization(String),
}

/// A single logical write. A batch of these is applied as one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    SetGameState(GameState),
    PutPlayer(Player),
    /// Deal a scenario for a new round, clearing response and submitted flag
    AssignScenario {
        id: PlayerId,
        scenario_id: ScenarioId,
    },
    /// Record a response and mark the player submitted
    SubmitResponse { id: PlayerId, response: String },
    RemoveAllPlayers,
}

/// Change notification emitted after a write lands
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    GameStateChanged(GameState),
    PlayerChanged(Player),
    PlayersCleared,
}

/// Narrow interface over the authoritative store
#[async_trait]
pub trait Store: Send + Sync {
    /// Current game state (default when nothing was written yet)
    async fn game_state(&self) -> StoreResult<GameState>;

    /// All enrolled players
    async fn players(&self) -> StoreResult<Vec<Player>>;

    async fn player(&self, id: &str) -> StoreResult<Option<Player>>;

    /// Reserve a fresh unique player key
    async fn allocate_player_id(&self) -> StoreResult<PlayerId>;

    async fn put_player(&self, player: Player) -> StoreResult<()> {
        self.apply(vec![Update::PutPlayer(player)]).await
    }

    /// Apply a batch of updates
    async fn apply(&self, batch: Vec<Update>) -> StoreResult<()>;

    /// Whether `apply` is all-or-nothing
    fn atomic_batches(&self) -> bool {
        true
    }

    /// Subscribe to change notifications
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;

    /// Name of the backend, for logging
    fn name(&self) -> &str;
}
