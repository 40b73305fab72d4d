//! Analytics events and the in-process EventBus
//!
//! Handlers publish [`AnalyticsEvent`]s without knowing whether any sink is
//! configured. The server's fan-out task subscribes and forwards them to the
//! message bus and the columnar store when those are enabled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Score maps attached to a review (`{"plot": 8, "acting": 7}`)
pub type ScoreMap = BTreeMap<String, f64>;

/// Analytics event types
///
/// Serialized with an `event_type` tag so the JSON matches what downstream
/// consumers read from the message bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    ReviewCreated {
        user_id: i64,
        content_id: i64,
        content_type: String,
        rating: Option<f64>,
        #[serde(default)]
        emotions: ScoreMap,
        #[serde(default)]
        aspects: ScoreMap,
        source: String,
        event_time: DateTime<Utc>,
    },
    ReviewUpdated {
        user_id: i64,
        content_id: i64,
        content_type: String,
        rating: Option<f64>,
        source: String,
        event_time: DateTime<Utc>,
    },
    ReviewDeleted {
        user_id: i64,
        content_id: i64,
        content_type: String,
        event_time: DateTime<Utc>,
    },
    RatingChanged {
        user_id: i64,
        content_id: i64,
        content_type: String,
        old_rating: Option<f64>,
        new_rating: Option<f64>,
        event_time: DateTime<Utc>,
    },
    UserRegistered {
        user_id: i64,
        username: String,
        event_time: DateTime<Utc>,
    },
    UserLogin {
        user_id: i64,
        event_time: DateTime<Utc>,
    },
    UserUpdated {
        user_id: i64,
        event_time: DateTime<Utc>,
    },
    AchievementUnlocked {
        user_id: i64,
        achievement: String,
        event_time: DateTime<Utc>,
    },
    ContentViewed {
        content_id: i64,
        content_type: String,
        user_id: Option<i64>,
        event_time: DateTime<Utc>,
    },
    ContentSearched {
        query: String,
        results_count: usize,
        user_id: Option<i64>,
        event_time: DateTime<Utc>,
    },
    ContentImported {
        content_id: i64,
        content_type: String,
        source: String,
        event_time: DateTime<Utc>,
    },
}

/// Message bus topic an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTopic {
    Reviews,
    Users,
    Content,
}

impl EventTopic {
    pub fn name(&self) -> &'static str {
        match self {
            EventTopic::Reviews => "reviews",
            EventTopic::Users => "users",
            EventTopic::Content => "content",
        }
    }
}

impl AnalyticsEvent {
    /// Wire name of the event (`review_created`, ...)
    pub fn event_type(&self) -> &'static str {
        match self {
            AnalyticsEvent::ReviewCreated { .. } => "review_created",
            AnalyticsEvent::ReviewUpdated { .. } => "review_updated",
            AnalyticsEvent::ReviewDeleted { .. } => "review_deleted",
            AnalyticsEvent::RatingChanged { .. } => "rating_changed",
            AnalyticsEvent::UserRegistered { .. } => "user_registered",
            AnalyticsEvent::UserLogin { .. } => "user_login",
            AnalyticsEvent::UserUpdated { .. } => "user_updated",
            AnalyticsEvent::AchievementUnlocked { .. } => "achievement_unlocked",
            AnalyticsEvent::ContentViewed { .. } => "content_viewed",
            AnalyticsEvent::ContentSearched { .. } => "content_searched",
            AnalyticsEvent::ContentImported { .. } => "content_imported",
        }
    }

    pub fn topic(&self) -> EventTopic {
        match self {
            AnalyticsEvent::ReviewCreated { .. }
            | AnalyticsEvent::ReviewUpdated { .. }
            | AnalyticsEvent::ReviewDeleted { .. }
            | AnalyticsEvent::RatingChanged { .. } => EventTopic::Reviews,
            AnalyticsEvent::UserRegistered { .. }
            | AnalyticsEvent::UserLogin { .. }
            | AnalyticsEvent::UserUpdated { .. }
            | AnalyticsEvent::AchievementUnlocked { .. } => EventTopic::Users,
            AnalyticsEvent::ContentViewed { .. }
            | AnalyticsEvent::ContentSearched { .. }
            | AnalyticsEvent::ContentImported { .. } => EventTopic::Content,
        }
    }

    /// Partition key: content id for review/content events, user id for user events
    ///
    /// Searches are not tied to a title and carry no key.
    pub fn partition_key(&self) -> Option<String> {
        match self {
            AnalyticsEvent::ReviewCreated { content_id, .. }
            | AnalyticsEvent::ReviewUpdated { content_id, .. }
            | AnalyticsEvent::ReviewDeleted { content_id, .. }
            | AnalyticsEvent::RatingChanged { content_id, .. }
            | AnalyticsEvent::ContentViewed { content_id, .. }
            | AnalyticsEvent::ContentImported { content_id, .. } => Some(content_id.to_string()),
            AnalyticsEvent::UserRegistered { user_id, .. }
            | AnalyticsEvent::UserLogin { user_id, .. }
            | AnalyticsEvent::UserUpdated { user_id, .. }
            | AnalyticsEvent::AchievementUnlocked { user_id, .. } => Some(user_id.to_string()),
            AnalyticsEvent::ContentSearched { .. } => None,
        }
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        match self {
            AnalyticsEvent::ReviewCreated { event_time, .. }
            | AnalyticsEvent::ReviewUpdated { event_time, .. }
            | AnalyticsEvent::ReviewDeleted { event_time, .. }
            | AnalyticsEvent::RatingChanged { event_time, .. }
            | AnalyticsEvent::UserRegistered { event_time, .. }
            | AnalyticsEvent::UserLogin { event_time, .. }
            | AnalyticsEvent::UserUpdated { event_time, .. }
            | AnalyticsEvent::AchievementUnlocked { event_time, .. }
            | AnalyticsEvent::ContentViewed { event_time, .. }
            | AnalyticsEvent::ContentSearched { event_time, .. }
            | AnalyticsEvent::ContentImported { event_time, .. } => *event_time,
        }
    }
}

/// Central distribution bus for analytics events
///
/// Wraps a `tokio::sync::broadcast` channel: publishing never blocks, slow
/// subscribers observe `Lagged` and lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalyticsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AnalyticsEvent,
    ) -> Result<usize, broadcast::error::SendError<AnalyticsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where no subscriber exists
    pub fn emit_lossy(&self, event: AnalyticsEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(user_id: i64) -> AnalyticsEvent {
        AnalyticsEvent::UserLogin {
            user_id,
            event_time: Utc::now(),
        }
    }

    #[test]
    fn test_event_serializes_with_event_type_tag() {
        let event = AnalyticsEvent::ReviewCreated {
            user_id: 7,
            content_id: 42,
            content_type: "MOVIE".to_string(),
            rating: Some(8.5),
            emotions: ScoreMap::from([("joy".to_string(), 60.0)]),
            aspects: ScoreMap::new(),
            source: "web".to_string(),
            event_time: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "review_created");
        assert_eq!(json["content_id"], 42);
        assert_eq!(json["emotions"]["joy"], 60.0);
        assert_eq!(event.event_type(), "review_created");
    }

    #[test]
    fn test_topics_and_keys() {
        let viewed = AnalyticsEvent::ContentViewed {
            content_id: 3,
            content_type: "GAME".to_string(),
            user_id: None,
            event_time: Utc::now(),
        };
        assert_eq!(viewed.topic(), EventTopic::Content);
        assert_eq!(viewed.partition_key().as_deref(), Some("3"));

        assert_eq!(login(9).topic().name(), "users");
        assert_eq!(login(9).partition_key().as_deref(), Some("9"));

        let searched = AnalyticsEvent::ContentSearched {
            query: "dune".to_string(),
            results_count: 2,
            user_id: Some(1),
            event_time: Utc::now(),
        };
        assert!(searched.partition_key().is_none());
    }

    #[test]
    fn test_eventbus_emit_delivers_to_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(login(1)).expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "user_login");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "user_login");
    }

    #[test]
    fn test_eventbus_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert!(bus.emit(login(1)).is_err());
        // Lossy emit must not panic either way
        bus.emit_lossy(login(1));
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.emit_lossy(login(i));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }
}
