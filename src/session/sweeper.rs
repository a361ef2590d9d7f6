//! Background eviction of idle sessions.

use crate::session::SessionRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sweep period as a fraction of the TTL (5 minutes for the 60-minute
/// default). A session can outlive its TTL by at most one period.
const SWEEPS_PER_TTL: u32 = 12;

/// Floor for the sweep period. `tokio::time::interval` panics on a zero
/// duration, which would kill the task silently inside its `JoinHandle`.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Spawn the periodic sweeper task. It runs until `cancel` fires, which makes
/// shutdown (and tests) deterministic.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    ttl: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = (ttl / SWEEPS_PER_TTL).max(MIN_SWEEP_PERIOD);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    run_sweep(&registry, ttl).await;
                }
            }
        }
    })
}

/// One sweep pass: collect expired entries, then close each transport outside
/// the registry lock so a slow close can't stall concurrent requests.
pub async fn run_sweep(registry: &SessionRegistry, ttl: Duration) {
    let expired = registry.sweep_expired(Instant::now(), ttl).await;
    if expired.is_empty() {
        return;
    }
    let count = expired.len();
    for (id, transport) in expired {
        if transport.close() {
            debug!(session = %&id[..id.len().min(8)], "Evicted idle session");
        }
    }
    info!(evicted = count, "Swept expired sessions");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasClient;
    use crate::session::SessionTransport;

    fn transport() -> Arc<SessionTransport> {
        Arc::new(SessionTransport::new(Arc::new(CanvasClient::new())))
    }

    #[tokio::test]
    async fn sweep_closes_only_expired_transports() {
        let registry = SessionRegistry::new();
        let ttl = Duration::from_secs(3600);

        let stale = transport();
        let fresh = transport();
        let stale_id = registry.create(stale.clone()).await;
        let fresh_id = registry.create(fresh.clone()).await;

        // Age the stale session past the TTL by back-dating its activity.
        let Some(past) = Instant::now().checked_sub(ttl + Duration::from_secs(1)) else {
            return;
        };
        assert!(registry.touch_at(&stale_id, past).await);

        run_sweep(&registry, ttl).await;

        assert!(registry.get(&stale_id).await.is_none());
        assert!(stale.is_closed());
        assert!(registry.get(&fresh_id).await.is_some());
        assert!(!fresh.is_closed());
    }

    #[tokio::test]
    async fn zero_ttl_does_not_kill_the_sweeper_task() {
        let registry = Arc::new(SessionRegistry::new());
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(registry, Duration::ZERO, cancel.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        // A panicked task would surface here as a JoinError.
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn cancellation_stops_the_sweeper() {
        let registry = Arc::new(SessionRegistry::new());
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(registry, Duration::from_secs(3600), cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }
}
