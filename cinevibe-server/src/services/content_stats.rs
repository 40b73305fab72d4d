//! Content aggregates recomputed from its reviews
//!
//! Runs after every review insert, edit and delete. All figures are derived
//! from scratch so the stored row can never drift from the review table.

use cinevibe_common::events::ScoreMap;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{parse_score_map, round2};

/// Critic rating at or above which a review counts as positive
pub const POSITIVE_THRESHOLD: f64 = 7.5;
/// Critic rating below which a review counts as negative
pub const NEGATIVE_THRESHOLD: f64 = 5.0;

/// One review as seen by the aggregator
#[derive(Debug, Clone, Default)]
pub struct ReviewSample {
    pub rating: Option<f64>,
    pub is_critic: bool,
    /// Written by a plain USER account
    pub is_audience: bool,
    pub is_recent: bool,
    pub aspects: ScoreMap,
    pub emotions: ScoreMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentAggregates {
    pub avg_rating: f64,
    pub critics_rating: f64,
    pub audience_rating: f64,
    pub reviews_count: i64,
    pub positive_reviews: i64,
    pub mixed_reviews: i64,
    pub negative_reviews: i64,
    pub hype_index: i64,
    pub emotional_cloud: ScoreMap,
    pub perception_map: ScoreMap,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn key_means(maps: impl Iterator<Item = ScoreMap>) -> ScoreMap {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for map in maps {
        for (key, value) in map {
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, round2(sum / n as f64)))
        .collect()
}

/// Fold review samples into the stored aggregates
pub fn aggregate(samples: &[ReviewSample]) -> ContentAggregates {
    let rated: Vec<&ReviewSample> = samples.iter().filter(|s| s.rating.is_some()).collect();
    let all: Vec<f64> = rated.iter().filter_map(|s| s.rating).collect();
    let critics: Vec<f64> = rated
        .iter()
        .filter(|s| s.is_critic)
        .filter_map(|s| s.rating)
        .collect();
    let audience: Vec<f64> = rated
        .iter()
        .filter(|s| s.is_audience)
        .filter_map(|s| s.rating)
        .collect();

    let positive = critics.iter().filter(|r| **r >= POSITIVE_THRESHOLD).count() as i64;
    let negative = critics.iter().filter(|r| **r < NEGATIVE_THRESHOLD).count() as i64;
    let mixed = critics.len() as i64 - positive - negative;

    let total = samples.len() as i64;
    let recent = samples.iter().filter(|s| s.is_recent).count() as i64;
    let hype = (total * 2 + all.len() as i64 + recent * 5).min(100);

    ContentAggregates {
        avg_rating: mean(&all),
        critics_rating: mean(&critics),
        audience_rating: mean(&audience),
        reviews_count: all.len() as i64,
        positive_reviews: positive,
        mixed_reviews: mixed,
        negative_reviews: negative,
        hype_index: hype,
        emotional_cloud: key_means(samples.iter().map(|s| s.emotions.clone())),
        perception_map: key_means(samples.iter().map(|s| s.aspects.clone())),
    }
}

fn map_to_column(map: &ScoreMap) -> Option<String> {
    if map.is_empty() {
        return None;
    }
    let object: serde_json::Map<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(*v)))
        .collect();
    Some(Value::Object(object).to_string())
}

/// Recompute and store the aggregates of one content row
pub async fn recalculate(pool: &SqlitePool, content_id: i64) -> Result<ContentAggregates, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r.rating, r.aspects, r.emotions, u.role,
               CASE WHEN r.created_at >= datetime('now', '-7 days') THEN 1 ELSE 0 END AS recent
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.content_id = ?
        "#,
    )
    .bind(content_id)
    .fetch_all(pool)
    .await?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in &rows {
        let role: String = row.try_get("role")?;
        let recent: i64 = row.try_get("recent")?;
        let aspects: Option<String> = row.try_get("aspects")?;
        let emotions: Option<String> = row.try_get("emotions")?;
        samples.push(ReviewSample {
            rating: row.try_get("rating")?,
            is_critic: role == "CRITIC",
            is_audience: role == "USER",
            is_recent: recent != 0,
            aspects: parse_score_map(aspects.as_deref()),
            emotions: parse_score_map(emotions.as_deref()),
        });
    }

    let agg = aggregate(&samples);

    sqlx::query(
        r#"
        UPDATE content SET
            avg_rating = ?, critics_rating = ?, audience_rating = ?,
            reviews_count = ?, positive_reviews = ?, mixed_reviews = ?, negative_reviews = ?,
            hype_index = ?, emotional_cloud = ?, perception_map = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(agg.avg_rating)
    .bind(agg.critics_rating)
    .bind(agg.audience_rating)
    .bind(agg.reviews_count)
    .bind(agg.positive_reviews)
    .bind(agg.mixed_reviews)
    .bind(agg.negative_reviews)
    .bind(agg.hype_index)
    .bind(map_to_column(&agg.emotional_cloud))
    .bind(map_to_column(&agg.perception_map))
    .bind(content_id)
    .execute(pool)
    .await?;

    debug!(
        "Recalculated content {}: avg={} reviews={} hype={}",
        content_id, agg.avg_rating, agg.reviews_count, agg.hype_index
    );

    Ok(agg)
}
