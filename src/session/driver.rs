use super::{PlayerSession, SessionError, SubmitIntent, Submitter};
use crate::countdown::{now_millis, TICK_INTERVAL_MS};
use crate::types::TimestampMs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

async fn dispatch<S: Submitter + ?Sized>(
    session: &Mutex<PlayerSession>,
    submitter: &S,
    intent: &SubmitIntent,
) -> Result<(), SessionError> {
    // The lock is not held across the network call
    let result = submitter.submit(&intent.player_id, &intent.response).await;

    let mut session = session.lock().await;
    match result {
        Ok(()) => {
            session.confirm_submitted(intent);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "{} submit for {} failed: {}",
                if intent.automatic { "Auto" } else { "Manual" },
                intent.player_id,
                e
            );
            session.submit_failed(intent);
            Err(e)
        }
    }
}

/// One countdown evaluation: dispatches the auto-submit if it is due.
/// Returns the intent that was sent, if any.
pub async fn tick_once<S: Submitter + ?Sized>(
    session: &Mutex<PlayerSession>,
    submitter: &S,
    local_now: TimestampMs,
) -> Option<SubmitIntent> {
    let intent = session.lock().await.tick(local_now)?;
    tracing::info!("Time is up, auto-submitting for {}", intent.player_id);
    // Failures are logged and not retried
    let _ = dispatch(session, submitter, &intent).await;
    Some(intent)
}

/// Manual submission of the current draft
pub async fn submit_now<S: Submitter + ?Sized>(
    session: &Mutex<PlayerSession>,
    submitter: &S,
    local_now: TimestampMs,
) -> Result<SubmitIntent, SessionError> {
    let intent = session.lock().await.submit(local_now)?;
    dispatch(session, submitter, &intent).await?;
    Ok(intent)
}

/// Re-evaluate the countdown every second until the handle is aborted
pub fn spawn_countdown<S: Submitter + ?Sized + 'static>(
    session: Arc<Mutex<PlayerSession>>,
    submitter: Arc<S>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
        loop {
            interval.tick().await;
            tick_once(&session, submitter.as_ref(), now_millis()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameState, Player};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSubmitter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Submitter for CountingSubmitter {
        async fn submit(&self, _player_id: &str, _response: &str) -> Result<(), SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SessionError::Request("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn session(ends_at: TimestampMs) -> Mutex<PlayerSession> {
        let mut player = Player::new("p1".to_string(), "Alice".to_string());
        player.scenario_id = Some(2);
        let mut session = PlayerSession::new(&player);
        session.apply_game_state(&GameState::started(ends_at));
        Mutex::new(session)
    }

    #[tokio::test]
    async fn test_repeated_ticks_dispatch_once() {
        let session = session(10_000);
        let submitter = CountingSubmitter::default();

        assert!(tick_once(&session, &submitter, 5_000).await.is_none());
        for t in 0..5 {
            tick_once(&session, &submitter, 10_000 + t * 1_000).await;
        }

        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
        assert!(session.lock().await.is_submitted());
    }

    #[tokio::test]
    async fn test_failed_auto_submit_is_not_retried() {
        let session = session(10_000);
        let submitter = CountingSubmitter {
            fail: true,
            ..Default::default()
        };

        for t in 0..5 {
            tick_once(&session, &submitter, 10_000 + t * 1_000).await;
        }
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
        assert!(!session.lock().await.is_submitted());
    }

    #[tokio::test]
    async fn test_manual_then_expiry_sends_once() {
        let session = session(10_000);
        let submitter = CountingSubmitter::default();

        submit_now(&session, &submitter, 1_000).await.unwrap();
        tick_once(&session, &submitter, 10_000).await;

        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    }

    /// Holds each submit until released, to model a slow network
    struct GatedSubmitter {
        gate: tokio::sync::Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Submitter for GatedSubmitter {
        async fn submit(&self, _player_id: &str, _response: &str) -> Result<(), SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_submit_from_previous_round_leaves_new_round_open() {
        let session = Arc::new(session(10_000));
        let submitter = Arc::new(GatedSubmitter {
            gate: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        });

        let in_flight = {
            let session = session.clone();
            let submitter = submitter.clone();
            tokio::spawn(async move { tick_once(&session, submitter.as_ref(), 10_000).await })
        };
        while submitter.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // New round lands while the old auto-submit is still pending
        {
            let mut guard = session.lock().await;
            let mut player = Player::new("p1".to_string(), "Alice".to_string());
            player.scenario_id = Some(4);
            guard.apply_player(&player);
            guard.apply_game_state(&GameState::started(50_000));
        }

        submitter.gate.notify_one();
        let fired = in_flight.await.unwrap().unwrap();
        assert_eq!(fired.round_ends_at, Some(10_000));

        let counter = CountingSubmitter::default();
        assert!(!session.lock().await.is_submitted());
        assert!(tick_once(&session, &counter, 50_000).await.is_some());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(session.lock().await.is_submitted());
    }

    #[tokio::test]
    async fn test_manual_submit_failure_can_be_retried() {
        let session = session(10_000);
        let failing = CountingSubmitter {
            fail: true,
            ..Default::default()
        };
        assert!(submit_now(&session, &failing, 1_000).await.is_err());

        let working = CountingSubmitter::default();
        assert!(submit_now(&session, &working, 2_000).await.is_ok());
        assert!(session.lock().await.is_submitted());
    }
}
