#[cfg(feature = "kafka")]
mod kafka {
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};
    use wayfare_core::repository::EventPublisher;
    use wayfare_core::{CoreError, CoreResult};
    use wayfare_shared::VectorSyncEvent;

    use crate::app_config::KafkaConfig;

    /// Publishes vector-index sync events to a Kafka topic, keyed by
    /// `Type:id` so updates of one listing stay ordered within a partition.
    #[derive(Clone)]
    pub struct KafkaEventPublisher {
        producer: FutureProducer,
        topic: String,
    }

    impl KafkaEventPublisher {
        pub fn new(config: &KafkaConfig) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", &config.brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self {
                producer,
                topic: config.topic.clone(),
            })
        }
    }

    #[async_trait]
    impl EventPublisher for KafkaEventPublisher {
        async fn publish(&self, event: &VectorSyncEvent) -> CoreResult<()> {
            let key = event.key();
            let payload = serde_json::to_string(event)
                .map_err(|e| CoreError::InternalError(format!("Failed to encode event: {}", e)))?;

            let record = FutureRecord::to(&self.topic)
                .key(&key)
                .payload(&payload)
                .headers(rdkafka::message::OwnedHeaders::new().insert(rdkafka::message::Header {
                    key: "event_type",
                    value: Some(event.event_type()),
                }));

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent {} for {} to {}: partition {} offset {}",
                        event.event_type(),
                        key,
                        self.topic,
                        delivery.partition,
                        delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send {} to {}: {}", key, self.topic, e);
                    Err(CoreError::InternalError(format!("Kafka delivery failed: {}", e)))
                }
            }
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventPublisher;
