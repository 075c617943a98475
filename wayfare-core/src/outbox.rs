use std::time::Duration;
use tracing::{debug, warn};

use crate::repository::{EventOutbox, EventPublisher};
use crate::CoreResult;

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub claimed: usize,
    pub published: usize,
    pub released: usize,
    pub failed: usize,
}

/// Moves queued notifications from the outbox to the publisher,
/// at-least-once.
#[derive(Debug, Clone)]
pub struct OutboxRelay {
    batch_size: usize,
    max_attempts: i32,
    lease: Duration,
}

impl Default for OutboxRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboxRelay {
    pub fn new() -> Self {
        Self {
            batch_size: 50,
            max_attempts: 5,
            lease: Duration::from_secs(60),
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max: i32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn drain(
        &self,
        outbox: &dyn EventOutbox,
        publisher: &dyn EventPublisher,
    ) -> CoreResult<DrainResult> {
        let records = outbox.claim_pending(self.batch_size, self.lease).await?;
        let mut result = DrainResult {
            claimed: records.len(),
            ..Default::default()
        };

        for record in records {
            match publisher.publish(&record.event).await {
                Ok(()) => {
                    outbox.mark_published(record.id).await?;
                    result.published += 1;
                }
                Err(e) => {
                    let give_up = record.attempts + 1 >= self.max_attempts;
                    warn!(
                        "Publishing outbox record {} ({}) failed on attempt {}: {}",
                        record.id,
                        record.event.key(),
                        record.attempts + 1,
                        e
                    );
                    outbox.mark_failed(record.id, &e.to_string(), give_up).await?;
                    if give_up {
                        result.failed += 1;
                    } else {
                        result.released += 1;
                    }
                }
            }
        }

        if result.claimed > 0 {
            debug!("Outbox drain: {:?}", result);
        }
        Ok(result)
    }
}
