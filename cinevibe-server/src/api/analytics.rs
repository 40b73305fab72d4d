//! Analytics endpoints
//!
//! Relational rankings come straight from SQLite. The `/realtime` group reads
//! the columnar store and degrades to empty bodies carrying
//! `clickhouse_enabled` when the store is off or has no data.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::Row;
use tracing::warn;

use super::clamp_limit;
use crate::error::ApiResult;
use crate::models::round2;
use crate::AppState;

const NO_DATA: &str = "No analytics data available. ClickHouse may be disabled or no events recorded.";
const NO_ACTIVITY: &str = "No activity data available.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldQuery {
    pub content_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopContentQuery {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub limit: Option<u32>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountryRating {
    pub country: String,
    pub review_count: i64,
    pub avg_rating: f64,
}

/// Unwrap a store read, logging and substituting the empty value on error
fn or_empty<T: Default>(what: &str, result: anyhow::Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!("ClickHouse {} query failed: {:#}", what, e);
        T::default()
    })
}

// ============================================================================
// Relational
// ============================================================================

/// GET /api/analytics/world-ratings?contentId=
pub async fn world_ratings(
    State(state): State<AppState>,
    Query(q): Query<WorldQuery>,
) -> ApiResult<Json<Vec<CountryRating>>> {
    let mut sql = String::from(
        "SELECT u.country, COUNT(r.id) AS review_count, CAST(AVG(r.rating) AS REAL) AS avg_rating \
         FROM reviews r JOIN users u ON u.id = r.user_id \
         WHERE u.country IS NOT NULL AND r.rating IS NOT NULL",
    );
    if q.content_id.is_some() {
        sql.push_str(" AND r.content_id = ?");
    }
    sql.push_str(" GROUP BY u.country ORDER BY avg_rating DESC");

    let mut query = sqlx::query(&sql);
    if let Some(id) = q.content_id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&state.db).await?;

    Ok(Json(
        rows.iter()
            .map(|row| -> Result<CountryRating, sqlx::Error> {
                Ok(CountryRating {
                    country: row.try_get("country")?,
                    review_count: row.try_get("review_count")?,
                    avg_rating: round2(row.try_get("avg_rating")?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// Column a content ranking is ordered by
#[derive(Debug, Clone, Copy)]
enum Ranking {
    /// Lowest average first, reviewed titles only
    AntiRating,
    /// Highest hype first
    Hype,
}

impl Ranking {
    fn sql(self) -> &'static str {
        match self {
            Ranking::AntiRating => {
                "SELECT id, title, poster_url, content_type, avg_rating, reviews_count \
                 FROM content WHERE reviews_count >= 1 ORDER BY avg_rating ASC, id ASC LIMIT ?"
            }
            Ranking::Hype => {
                "SELECT id, title, poster_url, content_type, hype_index, reviews_count \
                 FROM content ORDER BY hype_index DESC, id ASC LIMIT ?"
            }
        }
    }
}

async fn ranked_content(state: &AppState, ranking: Ranking, limit: i64) -> ApiResult<Vec<Value>> {
    let rows = sqlx::query(ranking.sql()).bind(limit).fetch_all(&state.db).await?;

    Ok(rows
        .iter()
        .map(|row| -> Result<Value, sqlx::Error> {
            let mut item = json!({
                "id": row.try_get::<i64, _>("id")?,
                "title": row.try_get::<String, _>("title")?,
                "poster_url": row.try_get::<Option<String>, _>("poster_url")?,
                "content_type": row.try_get::<String, _>("content_type")?,
                "reviews_count": row.try_get::<i64, _>("reviews_count")?,
            });
            match ranking {
                Ranking::AntiRating => item["avg_rating"] = json!(row.try_get::<f64, _>("avg_rating")?),
                Ranking::Hype => item["hype_index"] = json!(row.try_get::<i64, _>("hype_index")?),
            }
            Ok(item)
        })
        .collect::<Result<Vec<_>, _>>()?)
}

/// GET /api/analytics/anti-rating?limit=10
pub async fn anti_rating(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let limit = clamp_limit(q.limit, 10, 100);
    Ok(Json(ranked_content(&state, Ranking::AntiRating, limit).await?))
}

/// GET /api/analytics/hype-top?limit=10
pub async fn hype_top(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let limit = clamp_limit(q.limit, 10, 100);
    Ok(Json(ranked_content(&state, Ranking::Hype, limit).await?))
}

// ============================================================================
// Realtime (columnar store)
// ============================================================================

/// GET /api/analytics/realtime/status
pub async fn realtime_status(State(state): State<AppState>) -> Json<Value> {
    Json(state.analytics.status())
}

/// GET /api/analytics/realtime/content/:contentId
pub async fn content_analytics(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    match or_empty("content", store.content_analytics(content_id).await) {
        Some(stats) => Json(json!({
            "content_id": content_id,
            "views": stats.views,
            "reviews": stats.reviews,
            "avg_rating": round2(stats.avg_rating),
            "unique_users": stats.unique_users,
        })),
        None => Json(json!({
            "content_id": content_id,
            "message": NO_DATA,
            "clickhouse_enabled": store.is_enabled(),
        })),
    }
}

/// GET /api/analytics/realtime/top-content?type&limit&days
pub async fn top_content(State(state): State<AppState>, Query(q): Query<TopContentQuery>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let limit = q.limit.unwrap_or(10).clamp(1, 100);
    let days = q.days.unwrap_or(7).max(1);

    let results = or_empty(
        "top content",
        store.top_content(q.content_type.as_deref(), limit, days).await,
    );
    if results.is_empty() {
        return Json(json!({
            "results": [],
            "message": NO_DATA,
            "clickhouse_enabled": store.is_enabled(),
        }));
    }
    Json(json!({ "results": results }))
}

/// GET /api/analytics/realtime/user/:userId
pub async fn user_activity(State(state): State<AppState>, Path(user_id): Path<i64>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let activity = or_empty("user activity", store.user_activity(user_id).await);
    if activity.is_empty() {
        return Json(json!({
            "user_id": user_id,
            "message": NO_ACTIVITY,
            "clickhouse_enabled": store.is_enabled(),
        }));
    }
    Json(json!({ "user_id": user_id, "activity": activity }))
}

/// GET /api/analytics/realtime/trends/reviews?days=30
pub async fn review_trends(State(state): State<AppState>, Query(q): Query<DaysQuery>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let days = q.days.unwrap_or(30).max(1);
    let data = or_empty("review trends", store.review_trends(days).await);
    Json(json!({
        "period_days": days,
        "data": data,
        "clickhouse_enabled": store.is_enabled(),
    }))
}

/// GET /api/analytics/realtime/distribution/ratings?type
pub async fn rating_distribution(State(state): State<AppState>, Query(q): Query<TypeQuery>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let distribution = or_empty(
        "rating distribution",
        store.rating_distribution(q.content_type.as_deref()).await,
    );
    Json(json!({
        "content_type": q.content_type.as_deref().unwrap_or("all"),
        "distribution": distribution,
        "clickhouse_enabled": store.is_enabled(),
    }))
}

/// GET /api/analytics/realtime/emotions?contentId
pub async fn emotions(State(state): State<AppState>, Query(q): Query<WorldQuery>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let emotions = or_empty("emotions", store.emotions(q.content_id).await);
    Json(json!({
        "content_id": q.content_id.map(Value::from).unwrap_or_else(|| json!("all")),
        "emotions": emotions,
        "clickhouse_enabled": store.is_enabled(),
    }))
}

/// GET /api/analytics/realtime/activity/hourly
pub async fn hourly_activity(State(state): State<AppState>) -> Json<Value> {
    let store = &state.analytics.clickhouse;
    let data = or_empty("hourly activity", store.hourly_activity().await);
    Json(json!({
        "data": data,
        "clickhouse_enabled": store.is_enabled(),
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/world-ratings", get(world_ratings))
        .route("/anti-rating", get(anti_rating))
        .route("/hype-top", get(hype_top))
        .route("/realtime/status", get(realtime_status))
        .route("/realtime/content/:content_id", get(content_analytics))
        .route("/realtime/top-content", get(top_content))
        .route("/realtime/user/:user_id", get(user_activity))
        .route("/realtime/trends/reviews", get(review_trends))
        .route("/realtime/distribution/ratings", get(rating_distribution))
        .route("/realtime/emotions", get(emotions))
        .route("/realtime/activity/hourly", get(hourly_activity))
}
