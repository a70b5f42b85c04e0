//! Heartbeat ping/pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use relay_hub::ClientHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a client's alive flag.
///
/// At each `interval` tick the flag is checked and cleared. Once
/// `timeout / interval` consecutive ticks (at least 2) pass without a pong,
/// the client is considered dead. A single miss is never enough: the check
/// lands on the same tick as the writer's ping, before the pong can arrive.
pub async fn run_heartbeat(
    handle: Arc<ClientHandle>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    let mut missed_pongs: u32 = 0;
    let interval_ms = interval.as_millis().max(1);
    let max_missed = u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(2);

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if handle.check_alive() {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    if missed_pongs >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ConnectionId;
    use relay_hub::BroadcastHub;

    fn make_handle() -> Arc<ClientHandle> {
        BroadcastHub::default()
            .register(ConnectionId::from("hb_conn"))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_cancelled() {
        let handle = make_handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            handle,
            Duration::from_secs(30),
            Duration::from_secs(90),
            cancel.clone(),
        ));
        cancel.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out() {
        let handle = make_handle();
        let result = run_heartbeat(
            handle,
            Duration::from_secs(1),
            Duration::from_secs(3),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn ponging_client_stays_alive() {
        let handle = make_handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            Arc::clone(&handle),
            Duration::from_secs(1),
            Duration::from_secs(2),
            cancel.clone(),
        ));

        for _ in 0..10 {
            handle.mark_alive();
            time::sleep(Duration::from_millis(900)).await;
        }
        assert!(!task.is_finished());
        cancel.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_just_after_ping_survives_equal_timeout() {
        let handle = make_handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            Arc::clone(&handle),
            Duration::from_secs(30),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        // Each pong lands 50ms after the ping sent on the interval tick.
        time::sleep(Duration::from_millis(30_050)).await;
        for _ in 0..5 {
            handle.mark_alive();
            time::sleep(Duration::from_secs(30)).await;
        }
        assert!(!task.is_finished());
        cancel.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatResult::Cancelled);
    }
}
