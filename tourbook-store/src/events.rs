use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tourbook_core::{BoxError, Notifier};
use tourbook_shared::BookingEvent;
use tracing::{error, info};

/// Kafka producer for booking events.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic_prefix: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic_prefix: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic_prefix: topic_prefix.to_string(),
        })
    }

    pub fn topic_for(&self, event: &BookingEvent) -> String {
        format!("{}.{}", self.topic_prefix, event.topic())
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Notifier for EventProducer {
    async fn notify(&self, event: &BookingEvent) -> Result<(), BoxError> {
        let payload = serde_json::to_string(event)?;
        let key = event.tour_date_id().to_string();
        self.publish(&self.topic_for(event), &key, &payload).await?;
        Ok(())
    }
}
