//! Round Controller: starting and resetting rounds

use super::AppState;
use crate::countdown::now_millis;
use crate::error::{GameError, GameResult};
use crate::store::Update;
use crate::types::*;

/// Outcome of a successful round start
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStarted {
    pub round_ends_at: TimestampMs,
    pub player_count: usize,
}

impl AppState {
    /// Deal every enrolled player a fresh scenario and open a new round.
    ///
    /// Players who join after the player list is read here get no scenario
    /// until the next round.
    pub async fn start_round(&self) -> GameResult<RoundStarted> {
        self.start_round_at(now_millis()).await
    }

    pub(crate) async fn start_round_at(&self, now: TimestampMs) -> GameResult<RoundStarted> {
        let players = self.store.players().await?;
        if players.is_empty() {
            tracing::warn!("Refusing to start a round with no players");
            return Err(GameError::NoPlayers);
        }

        let game_state = self.store.game_state().await?;
        if game_state.is_active_at(now) {
            tracing::warn!(
                "Refusing to start a round while the current one runs until {:?}",
                game_state.round_ends_at
            );
            return Err(GameError::RoundInProgress);
        }

        let assignments: Vec<Update> = {
            let mut rng = rand::rng();
            players
                .iter()
                .map(|p| Update::AssignScenario {
                    id: p.id.clone(),
                    scenario_id: self.catalog.draw(&mut rng),
                })
                .collect()
        };

        let round_ends_at = now + self.config.round_duration.as_millis() as TimestampMs;
        let new_state = Update::SetGameState(GameState::started(round_ends_at));

        if self.store.atomic_batches() {
            let mut batch = assignments;
            batch.push(new_state);
            self.store.apply(batch).await?;
        } else {
            // Stage every assignment before flipping `started`, so a failure
            // leaves the previous game state in place
            self.store.apply(assignments).await?;
            self.store.apply(vec![new_state]).await?;
        }

        tracing::info!(
            "Round started for {} players, ends at {}",
            players.len(),
            round_ends_at
        );

        Ok(RoundStarted {
            round_ends_at,
            player_count: players.len(),
        })
    }

    /// Clear the game state and remove every player. Irreversible.
    pub async fn reset_game(&self) -> GameResult<()> {
        self.store
            .apply(vec![
                Update::SetGameState(GameState::default()),
                Update::RemoveAllPlayers,
            ])
            .await?;

        tracing::info!("Game reset, all players removed");
        Ok(())
    }
}
