use super::AppState;
use crate::error::{GameError, GameResult};
use crate::store::{StoreError, Update};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded,
    /// The player had already submitted this round; nothing was written
    AlreadySubmitted,
}

impl AppState {
    /// Enroll a new player. The store write is bounded by the join timeout.
    pub async fn join_player(&self, name: &str) -> GameResult<Player> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::Validation("Please enter your name".to_string()));
        }

        let timeout = self.config.join_timeout;
        let write = async {
            let id = self.store.allocate_player_id().await?;
            let player = Player::new(id, name.to_string());
            self.store.put_player(player.clone()).await?;
            Ok::<_, StoreError>(player)
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(player)) => {
                tracing::info!("Player {} joined as {}", player.name, player.id);
                Ok(player)
            }
            Ok(Err(StoreError::Timeout)) | Err(_) => {
                tracing::error!("Join for {} timed out after {:?}", name, timeout);
                Err(GameError::StoreTimeout(timeout))
            }
            Ok(Err(e)) => {
                tracing::error!("Join for {} failed: {}", name, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_player(&self, player_id: &str) -> GameResult<Player> {
        self.store
            .player(player_id)
            .await?
            .ok_or(GameError::PlayerNotFound)
    }

    /// Record a player's response for the current round.
    ///
    /// A player who already submitted is left untouched. The check happens
    /// right before the write and is not a compare-and-set: two concurrent
    /// submits may both land, the later write winning.
    pub async fn submit_response(
        &self,
        player_id: &str,
        response: Option<String>,
    ) -> GameResult<SubmitOutcome> {
        if player_id.trim().is_empty() {
            return Err(GameError::Validation("Player ID is required".to_string()));
        }

        let player = self.get_player(player_id).await?;
        if player.submitted {
            tracing::info!("Player {} already submitted, ignoring", player_id);
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        self.store
            .apply(vec![Update::SubmitResponse {
                id: player.id,
                response: response.unwrap_or_default(),
            }])
            .await
            .map_err(|e| {
                tracing::error!("Failed to submit response for {}: {}", player_id, e);
                e
            })?;

        tracing::info!("Player {} submitted", player_id);
        Ok(SubmitOutcome::Recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_trims_name() {
        let state = AppState::in_memory();
        let player = state.join_player("  Alice  ").await.unwrap();

        assert_eq!(player.name, "Alice");
        assert!(player.scenario_id.is_none());
        assert_eq!(player.response, "");
        assert!(!player.submitted);
        assert_eq!(state.get_player(&player.id).await.unwrap(), player);
    }

    #[tokio::test]
    async fn test_join_rejects_blank_name() {
        let state = AppState::in_memory();
        let result = state.join_player("   ").await;
        assert!(matches!(result, Err(GameError::Validation(_))));
        assert!(state.store.players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let state = AppState::in_memory();
        let player = state.join_player("Bob").await.unwrap();

        let outcome = state
            .submit_response(&player.id, Some("hello".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Recorded);

        let stored = state.get_player(&player.id).await.unwrap();
        assert_eq!(stored.response, "hello");
        assert!(stored.submitted);
    }

    #[tokio::test]
    async fn test_second_submit_is_a_no_op() {
        let state = AppState::in_memory();
        let player = state.join_player("Carol").await.unwrap();

        state
            .submit_response(&player.id, Some("first".to_string()))
            .await
            .unwrap();
        let outcome = state
            .submit_response(&player.id, Some("No response".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadySubmitted);

        let stored = state.get_player(&player.id).await.unwrap();
        assert_eq!(stored.response, "first");
        assert!(stored.submitted);
    }

    #[tokio::test]
    async fn test_submit_without_text_stores_empty_string() {
        let state = AppState::in_memory();
        let player = state.join_player("Dave").await.unwrap();

        state.submit_response(&player.id, None).await.unwrap();

        let stored = state.get_player(&player.id).await.unwrap();
        assert_eq!(stored.response, "");
        assert!(stored.submitted);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let state = AppState::in_memory();
        assert!(matches!(
            state.submit_response("", None).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            state.submit_response("missing", None).await,
            Err(GameError::PlayerNotFound)
        ));
    }
}
