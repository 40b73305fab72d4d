//! Analytics fan-out
//!
//! Handlers emit onto the [`EventBus`](cinevibe_common::EventBus). A single
//! background task drains it and hands each event to the message bus and the
//! columnar store. Sink failures are logged and the event is dropped.

pub mod clickhouse;
pub mod kafka;

use cinevibe_common::config::ServerConfig;
use cinevibe_common::AnalyticsEvent;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use self::clickhouse::ClickHouseStore;
pub use self::kafka::KafkaSink;

/// Both analytics sinks
pub struct AnalyticsHub {
    pub kafka: KafkaSink,
    pub clickhouse: ClickHouseStore,
}

impl AnalyticsHub {
    /// Hub with both sinks off
    pub fn disabled() -> Self {
        Self {
            kafka: KafkaSink::disabled(),
            clickhouse: ClickHouseStore::disabled(),
        }
    }

    pub async fn connect(config: &ServerConfig) -> Self {
        let hub = Self {
            kafka: KafkaSink::connect(&config.kafka),
            clickhouse: ClickHouseStore::connect(&config.clickhouse).await,
        };
        info!(
            "Analytics: kafka={} clickhouse={}",
            if hub.kafka.is_enabled() { "on" } else { "off" },
            if hub.clickhouse.is_enabled() { "on" } else { "off" },
        );
        hub
    }

    pub fn streaming_enabled(&self) -> bool {
        self.kafka.is_enabled() || self.clickhouse.is_enabled()
    }

    /// Forward one event to every enabled sink
    pub async fn publish(&self, event: &AnalyticsEvent) {
        if let Err(e) = self.kafka.publish(event).await {
            warn!("Dropping {} for kafka: {:#}", event.event_type(), e);
        }
        if let Err(e) = self.clickhouse.insert(event).await {
            warn!("Dropping {} for clickhouse: {:#}", event.event_type(), e);
        }
    }

    /// `GET /api/analytics/realtime/status` body
    pub fn status(&self) -> Value {
        json!({
            "kafka": {
                "enabled": self.kafka.is_enabled(),
                "connected": self.kafka.is_connected(),
                "brokers": self.kafka.brokers(),
                "topics": kafka::TOPICS,
            },
            "clickhouse": {
                "enabled": self.clickhouse.is_enabled(),
                "connected": self.clickhouse.is_connected(),
                "database": self.clickhouse.database(),
                "tables": clickhouse::TABLES,
            },
            "streaming_enabled": self.streaming_enabled(),
        })
    }
}

/// Drain `rx` into the hub until the bus closes
pub fn spawn_fanout(
    mut rx: broadcast::Receiver<AnalyticsEvent>,
    hub: Arc<AnalyticsHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!("Analytics event: {}", event.event_type());
                    hub.publish(&event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Analytics fan-out lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("Event bus closed, analytics fan-out stopping");
                    break;
                }
            }
        }
    })
}
