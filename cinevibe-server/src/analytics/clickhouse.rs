//! Columnar analytics store
//!
//! Every event becomes one row in `reviews_events`, `user_events` or
//! `content_events`. The dashboard queries read those tables back. Without
//! the `clickhouse` cargo feature the store is a no-op that answers every
//! query with an empty result.

use cinevibe_common::config::ClickHouseConfig;
use cinevibe_common::AnalyticsEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Row of `reviews_events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct ReviewEventRow {
    /// Seconds since the epoch (ClickHouse `DateTime`)
    pub event_time: u32,
    pub event_type: String,
    pub user_id: u32,
    pub content_id: u32,
    pub content_type: String,
    pub rating: Option<f32>,
    pub emotions: String,
    pub aspects: String,
    pub source: String,
}

/// Row of `user_events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct UserEventRow {
    pub event_time: u32,
    pub event_type: String,
    pub user_id: u32,
    pub metadata: String,
}

/// Row of `content_events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct ContentEventRow {
    pub event_time: u32,
    pub event_type: String,
    pub user_id: Option<u32>,
    pub content_id: u32,
    pub content_type: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventRow {
    Review(ReviewEventRow),
    User(UserEventRow),
    Content(ContentEventRow),
}

fn id32(id: i64) -> u32 {
    u32::try_from(id).unwrap_or(0)
}

fn epoch(event: &AnalyticsEvent) -> u32 {
    u32::try_from(event.event_time().timestamp()).unwrap_or(0)
}

/// Map an event onto its table row
pub fn to_row(event: &AnalyticsEvent) -> EventRow {
    let event_time = epoch(event);
    let event_type = event.event_type().to_string();

    match event {
        AnalyticsEvent::ReviewCreated {
            user_id,
            content_id,
            content_type,
            rating,
            emotions,
            aspects,
            source,
            ..
        } => EventRow::Review(ReviewEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            rating: rating.map(|r| r as f32),
            emotions: json!(emotions).to_string(),
            aspects: json!(aspects).to_string(),
            source: source.clone(),
        }),
        AnalyticsEvent::ReviewUpdated {
            user_id,
            content_id,
            content_type,
            rating,
            source,
            ..
        } => EventRow::Review(ReviewEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            rating: rating.map(|r| r as f32),
            emotions: "{}".to_string(),
            aspects: "{}".to_string(),
            source: source.clone(),
        }),
        AnalyticsEvent::RatingChanged {
            user_id,
            content_id,
            content_type,
            new_rating,
            ..
        } => EventRow::Review(ReviewEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            rating: new_rating.map(|r| r as f32),
            emotions: "{}".to_string(),
            aspects: "{}".to_string(),
            source: "web".to_string(),
        }),
        AnalyticsEvent::ReviewDeleted {
            user_id,
            content_id,
            content_type,
            ..
        } => EventRow::Review(ReviewEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            rating: None,
            emotions: "{}".to_string(),
            aspects: "{}".to_string(),
            source: "web".to_string(),
        }),
        AnalyticsEvent::UserRegistered { user_id, username, .. } => EventRow::User(UserEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            metadata: json!({ "username": username }).to_string(),
        }),
        AnalyticsEvent::UserLogin { user_id, .. } | AnalyticsEvent::UserUpdated { user_id, .. } => {
            EventRow::User(UserEventRow {
                event_time,
                event_type,
                user_id: id32(*user_id),
                metadata: "{}".to_string(),
            })
        }
        AnalyticsEvent::AchievementUnlocked {
            user_id,
            achievement,
            ..
        } => EventRow::User(UserEventRow {
            event_time,
            event_type,
            user_id: id32(*user_id),
            metadata: json!({ "achievement": achievement }).to_string(),
        }),
        AnalyticsEvent::ContentViewed {
            content_id,
            content_type,
            user_id,
            ..
        } => EventRow::Content(ContentEventRow {
            event_time,
            event_type,
            user_id: user_id.map(id32),
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            metadata: "{}".to_string(),
        }),
        AnalyticsEvent::ContentSearched {
            query,
            results_count,
            user_id,
            ..
        } => EventRow::Content(ContentEventRow {
            event_time,
            event_type,
            user_id: user_id.map(id32),
            content_id: 0,
            content_type: String::new(),
            metadata: json!({ "query": query, "results_count": results_count }).to_string(),
        }),
        AnalyticsEvent::ContentImported {
            content_id,
            content_type,
            source,
            ..
        } => EventRow::Content(ContentEventRow {
            event_time,
            event_type,
            user_id: None,
            content_id: id32(*content_id),
            content_type: content_type.clone(),
            metadata: json!({ "source": source }).to_string(),
        }),
    }
}

// ============================================================================
// Query result rows
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct ContentStatsRow {
    pub reviews: u64,
    pub avg_rating: f64,
    pub unique_users: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct CountRow {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct TopContentRow {
    pub content_id: u32,
    pub content_type: String,
    pub views: u64,
    pub reviews: u64,
    pub score: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct UserActivityRow {
    pub event_type: String,
    pub count: u64,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct TrendRow {
    pub date: String,
    pub reviews: u64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct DistributionRow {
    pub bucket: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct EmotionRow {
    pub emotion: String,
    pub mentions: u64,
    pub avg_intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "clickhouse", derive(clickhouse::Row))]
pub struct HourlyRow {
    pub hour: u8,
    pub events: u64,
}

/// Aggregated view of one title
#[derive(Debug, Clone, Serialize)]
pub struct ContentAnalytics {
    pub views: u64,
    pub reviews: u64,
    pub avg_rating: f64,
    pub unique_users: u64,
}

pub const TABLES: [&str; 3] = ["reviews_events", "user_events", "content_events"];

#[cfg(feature = "clickhouse")]
mod imp {
    use super::*;
    use anyhow::Context;
    use clickhouse::Client;
    use tracing::{info, warn};

    pub struct ClickHouseStore {
        client: Option<Client>,
        database: String,
        enabled: bool,
    }

    impl ClickHouseStore {
        pub fn disabled() -> Self {
            Self {
                client: None,
                database: String::new(),
                enabled: false,
            }
        }

        /// Connect and create the event tables when missing
        ///
        /// An unreachable server leaves the store enabled but disconnected.
        pub async fn connect(config: &ClickHouseConfig) -> Self {
            if !config.enabled {
                return Self {
                    client: None,
                    database: config.database.clone(),
                    enabled: false,
                };
            }

            let client = Client::default()
                .with_url(&config.url)
                .with_user(&config.user)
                .with_password(&config.password)
                .with_database(&config.database);

            let client = match ensure_schema(&client, &config.database).await {
                Ok(()) => {
                    info!("ClickHouse ready at {} (database {})", config.url, config.database);
                    Some(client)
                }
                Err(e) => {
                    warn!("ClickHouse unavailable: {:#}", e);
                    None
                }
            };

            Self {
                client,
                database: config.database.clone(),
                enabled: true,
            }
        }

        pub fn is_enabled(&self) -> bool {
            self.enabled
        }

        pub fn is_connected(&self) -> bool {
            self.client.is_some()
        }

        pub fn database(&self) -> &str {
            &self.database
        }

        pub async fn insert(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
            let Some(client) = &self.client else {
                return Ok(());
            };

            match to_row(event) {
                EventRow::Review(row) => {
                    let mut insert = client.insert("reviews_events")?;
                    insert.write(&row).await?;
                    insert.end().await?;
                }
                EventRow::User(row) => {
                    let mut insert = client.insert("user_events")?;
                    insert.write(&row).await?;
                    insert.end().await?;
                }
                EventRow::Content(row) => {
                    let mut insert = client.insert("content_events")?;
                    insert.write(&row).await?;
                    insert.end().await?;
                }
            }
            Ok(())
        }

        pub async fn content_analytics(&self, content_id: i64) -> anyhow::Result<Option<ContentAnalytics>> {
            let Some(client) = &self.client else {
                return Ok(None);
            };
            let id = id32(content_id);

            let stats = client
                .query(
                    "SELECT count() AS reviews, ifNull(avg(rating), 0) AS avg_rating, \
                     uniqExact(user_id) AS unique_users \
                     FROM reviews_events WHERE content_id = ? AND event_type = 'review_created'",
                )
                .bind(id)
                .fetch_one::<ContentStatsRow>()
                .await?;
            let views = client
                .query(
                    "SELECT count() AS count FROM content_events \
                     WHERE content_id = ? AND event_type = 'content_viewed'",
                )
                .bind(id)
                .fetch_one::<CountRow>()
                .await?;

            if stats.reviews == 0 && views.count == 0 {
                return Ok(None);
            }
            Ok(Some(ContentAnalytics {
                views: views.count,
                reviews: stats.reviews,
                avg_rating: stats.avg_rating,
                unique_users: stats.unique_users,
            }))
        }

        pub async fn top_content(
            &self,
            content_type: Option<&str>,
            limit: u32,
            days: u32,
        ) -> anyhow::Result<Vec<TopContentRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };

            let type_filter = if content_type.is_some() { "AND content_type = ?" } else { "" };
            let sql = format!(
                "SELECT content_id, any(content_type) AS content_type, \
                 countIf(event_type = 'content_viewed') AS views, \
                 countIf(event_type = 'review_created') AS reviews, \
                 views + reviews * 10 AS score \
                 FROM ( \
                     SELECT content_id, content_type, event_type, event_time FROM content_events \
                     UNION ALL \
                     SELECT content_id, content_type, event_type, event_time FROM reviews_events \
                 ) \
                 WHERE content_id > 0 AND event_time >= now() - toIntervalDay(?) {} \
                 GROUP BY content_id ORDER BY score DESC LIMIT ?",
                type_filter
            );

            let mut query = client.query(&sql).bind(days);
            if let Some(t) = content_type {
                query = query.bind(t);
            }
            Ok(query.bind(limit).fetch_all::<TopContentRow>().await?)
        }

        pub async fn user_activity(&self, user_id: i64) -> anyhow::Result<Vec<UserActivityRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };
            Ok(client
                .query(
                    "SELECT event_type, count() AS count, toString(max(event_time)) AS last_seen \
                     FROM ( \
                         SELECT event_type, event_time FROM user_events WHERE user_id = ? \
                         UNION ALL \
                         SELECT event_type, event_time FROM reviews_events WHERE user_id = ? \
                     ) \
                     GROUP BY event_type ORDER BY count DESC",
                )
                .bind(id32(user_id))
                .bind(id32(user_id))
                .fetch_all::<UserActivityRow>()
                .await?)
        }

        pub async fn review_trends(&self, days: u32) -> anyhow::Result<Vec<TrendRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };
            Ok(client
                .query(
                    "SELECT toString(toDate(event_time)) AS date, count() AS reviews, \
                     ifNull(avg(rating), 0) AS avg_rating \
                     FROM reviews_events \
                     WHERE event_type = 'review_created' AND event_time >= now() - toIntervalDay(?) \
                     GROUP BY date ORDER BY date",
                )
                .bind(days)
                .fetch_all::<TrendRow>()
                .await?)
        }

        pub async fn rating_distribution(
            &self,
            content_type: Option<&str>,
        ) -> anyhow::Result<Vec<DistributionRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };
            let type_filter = if content_type.is_some() { "AND content_type = ?" } else { "" };
            let sql = format!(
                "SELECT toString(toUInt8(floor(assumeNotNull(rating)))) AS bucket, count() AS count \
                 FROM reviews_events \
                 WHERE event_type = 'review_created' AND rating IS NOT NULL {} \
                 GROUP BY bucket ORDER BY toUInt8OrZero(bucket)",
                type_filter
            );
            let mut query = client.query(&sql);
            if let Some(t) = content_type {
                query = query.bind(t);
            }
            Ok(query.fetch_all::<DistributionRow>().await?)
        }

        pub async fn emotions(&self, content_id: Option<i64>) -> anyhow::Result<Vec<EmotionRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };
            let id_filter = if content_id.is_some() { "AND content_id = ?" } else { "" };
            let sql = format!(
                "SELECT tupleElement(kv, 1) AS emotion, count() AS mentions, \
                 avg(tupleElement(kv, 2)) AS avg_intensity \
                 FROM reviews_events \
                 ARRAY JOIN JSONExtractKeysAndValues(emotions, 'Float64') AS kv \
                 WHERE event_type = 'review_created' {} \
                 GROUP BY emotion ORDER BY mentions DESC LIMIT 20",
                id_filter
            );
            let mut query = client.query(&sql);
            if let Some(id) = content_id {
                query = query.bind(id32(id));
            }
            Ok(query.fetch_all::<EmotionRow>().await?)
        }

        pub async fn hourly_activity(&self) -> anyhow::Result<Vec<HourlyRow>> {
            let Some(client) = &self.client else {
                return Ok(Vec::new());
            };
            Ok(client
                .query(
                    "SELECT toHour(event_time) AS hour, count() AS events \
                     FROM ( \
                         SELECT event_time FROM reviews_events \
                         UNION ALL SELECT event_time FROM user_events \
                         UNION ALL SELECT event_time FROM content_events \
                     ) \
                     WHERE event_time >= now() - INTERVAL 7 DAY \
                     GROUP BY hour ORDER BY hour",
                )
                .fetch_all::<HourlyRow>()
                .await?)
        }
    }

    async fn ensure_schema(client: &Client, database: &str) -> anyhow::Result<()> {
        client
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
            .execute()
            .await
            .context("create database")?;

        let ddl = [
            "CREATE TABLE IF NOT EXISTS reviews_events (
                event_time DateTime,
                event_type LowCardinality(String),
                user_id UInt32,
                content_id UInt32,
                content_type LowCardinality(String),
                rating Nullable(Float32),
                emotions String,
                aspects String,
                source LowCardinality(String)
            ) ENGINE = MergeTree()
            PARTITION BY toYYYYMM(event_time)
            ORDER BY (content_id, event_time)",
            "CREATE TABLE IF NOT EXISTS user_events (
                event_time DateTime,
                event_type LowCardinality(String),
                user_id UInt32,
                metadata String
            ) ENGINE = MergeTree()
            PARTITION BY toYYYYMM(event_time)
            ORDER BY (user_id, event_time)",
            "CREATE TABLE IF NOT EXISTS content_events (
                event_time DateTime,
                event_type LowCardinality(String),
                user_id Nullable(UInt32),
                content_id UInt32,
                content_type LowCardinality(String),
                metadata String
            ) ENGINE = MergeTree()
            PARTITION BY toYYYYMM(event_time)
            ORDER BY (content_id, event_time)",
        ];
        for (table, sql) in TABLES.iter().zip(ddl) {
            client
                .query(sql)
                .execute()
                .await
                .with_context(|| format!("create table {}", table))?;
        }
        Ok(())
    }
}

#[cfg(not(feature = "clickhouse"))]
mod imp {
    use super::*;
    use tracing::warn;

    pub struct ClickHouseStore {
        database: String,
    }

    impl ClickHouseStore {
        pub fn disabled() -> Self {
            Self {
                database: String::new(),
            }
        }

        pub async fn connect(config: &ClickHouseConfig) -> Self {
            if config.enabled {
                warn!("CLICKHOUSE_ENABLED is set but the server was built without the 'clickhouse' feature");
            }
            Self {
                database: config.database.clone(),
            }
        }

        pub fn is_enabled(&self) -> bool {
            false
        }

        pub fn is_connected(&self) -> bool {
            false
        }

        pub fn database(&self) -> &str {
            &self.database
        }

        pub async fn insert(&self, _event: &AnalyticsEvent) -> anyhow::Result<()> {
            Ok(())
        }

        pub async fn content_analytics(&self, _content_id: i64) -> anyhow::Result<Option<ContentAnalytics>> {
            Ok(None)
        }

        pub async fn top_content(
            &self,
            _content_type: Option<&str>,
            _limit: u32,
            _days: u32,
        ) -> anyhow::Result<Vec<TopContentRow>> {
            Ok(Vec::new())
        }

        pub async fn user_activity(&self, _user_id: i64) -> anyhow::Result<Vec<UserActivityRow>> {
            Ok(Vec::new())
        }

        pub async fn review_trends(&self, _days: u32) -> anyhow::Result<Vec<TrendRow>> {
            Ok(Vec::new())
        }

        pub async fn rating_distribution(
            &self,
            _content_type: Option<&str>,
        ) -> anyhow::Result<Vec<DistributionRow>> {
            Ok(Vec::new())
        }

        pub async fn emotions(&self, _content_id: Option<i64>) -> anyhow::Result<Vec<EmotionRow>> {
            Ok(Vec::new())
        }

        pub async fn hourly_activity(&self) -> anyhow::Result<Vec<HourlyRow>> {
            Ok(Vec::new())
        }
    }
}

pub use imp::ClickHouseStore;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cinevibe_common::events::ScoreMap;

    #[test]
    fn test_review_created_row() {
        let event = AnalyticsEvent::ReviewCreated {
            user_id: 3,
            content_id: 8,
            content_type: "GAME".to_string(),
            rating: Some(7.5),
            emotions: ScoreMap::from([("joy".to_string(), 40.0)]),
            aspects: ScoreMap::new(),
            source: "web".to_string(),
            event_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        let EventRow::Review(row) = to_row(&event) else {
            panic!("expected a review row");
        };
        assert_eq!(row.event_time, 1_704_067_200);
        assert_eq!(row.event_type, "review_created");
        assert_eq!((row.user_id, row.content_id), (3, 8));
        assert_eq!(row.rating, Some(7.5));
        assert_eq!(row.emotions, r#"{"joy":40.0}"#);
        assert_eq!(row.aspects, "{}");
    }

    #[test]
    fn test_search_row_has_no_content() {
        let event = AnalyticsEvent::ContentSearched {
            query: "dune".to_string(),
            results_count: 2,
            user_id: None,
            event_time: Utc::now(),
        };
        let EventRow::Content(row) = to_row(&event) else {
            panic!("expected a content row");
        };
        assert_eq!(row.content_id, 0);
        assert_eq!(row.user_id, None);
        assert!(row.metadata.contains("\"query\":\"dune\""));
    }

    #[test]
    fn test_user_rows() {
        let event = AnalyticsEvent::AchievementUnlocked {
            user_id: 5,
            achievement: "First Step".to_string(),
            event_time: Utc::now(),
        };
        assert!(matches!(to_row(&event), EventRow::User(UserEventRow { user_id: 5, .. })));
    }

    #[tokio::test]
    async fn test_disabled_store_returns_empty() {
        let store = ClickHouseStore::disabled();
        assert!(!store.is_enabled());
        assert!(store.content_analytics(1).await.unwrap().is_none());
        assert!(store.hourly_activity().await.unwrap().is_empty());
    }
}
