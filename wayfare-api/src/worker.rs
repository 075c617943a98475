use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use wayfare_core::repository::{EventOutbox, EventPublisher};
use wayfare_core::{DrainResult, OutboxRelay};

/// Drains the outbox on a fixed interval until the task is dropped.
pub async fn start_outbox_worker(
    outbox: Arc<dyn EventOutbox>,
    publisher: Arc<dyn EventPublisher>,
    relay: OutboxRelay,
    poll_interval: Duration,
) {
    info!("Outbox worker started, polling every {:?}", poll_interval);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // keep draining while full batches come back
        while let Some(result) = drain_once(&relay, outbox.as_ref(), publisher.as_ref()).await {
            if result.published == 0 || result.claimed < relay.batch_size() {
                break;
            }
        }
    }
}

async fn drain_once(
    relay: &OutboxRelay,
    outbox: &dyn EventOutbox,
    publisher: &dyn EventPublisher,
) -> Option<DrainResult> {
    match relay.drain(outbox, publisher).await {
        Ok(result) => {
            if result.claimed > 0 {
                debug!(
                    "Outbox pass: {} claimed, {} published, {} released, {} failed",
                    result.claimed, result.published, result.released, result.failed
                );
            }
            Some(result)
        }
        Err(e) => {
            error!("Outbox drain failed: {}", e);
            None
        }
    }
}
