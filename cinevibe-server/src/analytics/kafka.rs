//! Message bus sink
//!
//! Events go to the `reviews`, `users` and `content` topics, keyed by the
//! content or user id so one title's events stay ordered within a partition.
//! Without the `kafka` cargo feature the sink is a permanent no-op.

use cinevibe_common::config::KafkaConfig;
use cinevibe_common::AnalyticsEvent;

pub const TOPICS: [&str; 3] = ["reviews", "users", "content"];

/// Topic, key and JSON payload for one event
pub fn encode(event: &AnalyticsEvent) -> anyhow::Result<(&'static str, Option<String>, String)> {
    let payload = serde_json::to_string(event)?;
    Ok((event.topic().name(), event.partition_key(), payload))
}

#[cfg(feature = "kafka")]
mod imp {
    use super::*;
    use anyhow::anyhow;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use std::time::Duration;
    use tracing::{info, warn};

    pub struct KafkaSink {
        producer: Option<FutureProducer>,
        brokers: Vec<String>,
        enabled: bool,
    }

    impl KafkaSink {
        pub fn disabled() -> Self {
            Self {
                producer: None,
                brokers: Vec::new(),
                enabled: false,
            }
        }

        pub fn connect(config: &KafkaConfig) -> Self {
            if !config.enabled {
                return Self {
                    producer: None,
                    brokers: config.brokers.clone(),
                    enabled: false,
                };
            }

            let producer = ClientConfig::new()
                .set("bootstrap.servers", config.brokers.join(","))
                .set("client.id", &config.client_id)
                .set("message.timeout.ms", "5000")
                .create::<FutureProducer>();

            let producer = match producer {
                Ok(p) => {
                    info!("Kafka producer ready (brokers: {})", config.brokers.join(","));
                    Some(p)
                }
                Err(e) => {
                    warn!("Kafka producer unavailable: {}", e);
                    None
                }
            };

            Self {
                producer,
                brokers: config.brokers.clone(),
                enabled: true,
            }
        }

        pub fn is_enabled(&self) -> bool {
            self.enabled
        }

        pub fn is_connected(&self) -> bool {
            self.producer.is_some()
        }

        pub fn brokers(&self) -> &[String] {
            &self.brokers
        }

        pub async fn publish(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
            let Some(producer) = &self.producer else {
                return Ok(());
            };

            let (topic, key, payload) = encode(event)?;
            let mut record = FutureRecord::to(topic).payload(&payload);
            if let Some(key) = &key {
                record = record.key(key);
            }

            producer
                .send(record, Duration::from_secs(5))
                .await
                .map_err(|(e, _)| anyhow!("Kafka send to '{}' failed: {}", topic, e))?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "kafka"))]
mod imp {
    use super::*;
    use tracing::warn;

    pub struct KafkaSink {
        brokers: Vec<String>,
    }

    impl KafkaSink {
        pub fn disabled() -> Self {
            Self { brokers: Vec::new() }
        }

        pub fn connect(config: &KafkaConfig) -> Self {
            if config.enabled {
                warn!("KAFKA_ENABLED is set but the server was built without the 'kafka' feature");
            }
            Self {
                brokers: config.brokers.clone(),
            }
        }

        pub fn is_enabled(&self) -> bool {
            false
        }

        pub fn is_connected(&self) -> bool {
            false
        }

        pub fn brokers(&self) -> &[String] {
            &self.brokers
        }

        pub async fn publish(&self, _event: &AnalyticsEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }
}

pub use imp::KafkaSink;
