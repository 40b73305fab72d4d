//! Content catalog: search, detail views, per-country breakdowns and admin CRUD

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use cinevibe_common::{AnalyticsEvent, ContentType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::Row;
use tracing::{debug, info};
use validator::Validate;

use super::{clamp_limit, hero};
use crate::auth::{AdminUser, AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    find_content, insert_content, parse_json, round2, ContentDraft, ContentRecord, CONTENT_COLUMNS,
};
use crate::services::countries::country_code;
use crate::AppState;

const CRITIC_POSITIVE: f64 = 7.5;
const USER_POSITIVE: f64 = 7.0;
const NEGATIVE_BELOW: f64 = 5.0;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    #[serde(alias = "content_type")]
    pub r#type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(alias = "content_type")]
    pub r#type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

/// Create/update body; every field optional so the same form serves PUT
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContentForm {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[serde(alias = "type", alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(alias = "releaseYear")]
    #[validate(range(min = 1900, max = 2100, message = "Release year must be between 1900 and 2100"))]
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "posterUrl")]
    pub poster_url: Option<String>,
    #[serde(alias = "trailerUrl")]
    pub trailer_url: Option<String>,
    pub director: Option<String>,
    #[serde(rename = "cast")]
    pub cast_list: Option<String>,
    pub director_photo_url: Option<String>,
    pub cast_photos: Option<Value>,
    pub runtime: Option<i64>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub platforms: Option<Value>,
    pub esrb_rating: Option<String>,
    pub players: Option<String>,
    pub file_size: Option<String>,
    pub technical_info: Option<Value>,
}

/// Comma separated string or array into a JSON array of trimmed strings
pub fn list_value(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(s) => Some(Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        )),
        Value::Array(_) => Some(raw.clone()),
        _ => None,
    }
}

fn parse_type(raw: Option<&str>) -> ApiResult<Option<ContentType>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(Some(s.parse::<ContentType>()?)),
        None => Ok(None),
    }
}

impl ContentForm {
    fn into_draft(self) -> ApiResult<ContentDraft> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::bad_request("Title is required"))?
            .to_string();
        let content_type = parse_type(self.content_type.as_deref())?.unwrap_or(ContentType::Movie);

        let mut draft = ContentDraft::new(title, content_type);
        draft.release_year = self.release_year;
        draft.genre = self.genre;
        draft.description = self.description;
        draft.poster_url = self.poster_url;
        draft.trailer_url = self.trailer_url;
        draft.director = self.director;
        draft.cast_list = self.cast_list;
        draft.director_photo_url = self.director_photo_url;
        draft.cast_photos = self.cast_photos.as_ref().and_then(list_value);
        draft.runtime = self.runtime;
        draft.developer = self.developer;
        draft.publisher = self.publisher;
        draft.platforms = self.platforms.as_ref().and_then(list_value);
        draft.esrb_rating = self.esrb_rating;
        draft.players = self.players;
        draft.file_size = self.file_size;
        draft.technical_info = self.technical_info;
        Ok(draft)
    }
}

async fn fetch_content_list(
    state: &AppState,
    title_like: Option<String>,
    content_type: Option<ContentType>,
    limit: i64,
) -> ApiResult<Vec<ContentRecord>> {
    let mut sql = format!("SELECT {} FROM content WHERE 1 = 1", CONTENT_COLUMNS);
    if title_like.is_some() {
        sql.push_str(" AND title LIKE ?");
    }
    if content_type.is_some() {
        sql.push_str(" AND content_type = ?");
    }
    sql.push_str(" ORDER BY id DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(pattern) = &title_like {
        query = query.bind(pattern);
    }
    if let Some(ct) = content_type {
        query = query.bind(ct.as_str());
    }
    let rows = query.bind(limit).fetch_all(&state.db).await?;

    Ok(rows
        .iter()
        .map(ContentRecord::from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// GET /api/content/search
pub async fn search(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<Vec<ContentRecord>>> {
    let limit = clamp_limit(q.limit, 20, 100);
    let content_type = parse_type(q.r#type.as_deref())?;
    let text = q.query.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let results =
        fetch_content_list(&state, text.map(|t| format!("%{}%", t)), content_type, limit).await?;

    state.events.emit_lossy(AnalyticsEvent::ContentSearched {
        query: text.unwrap_or_default().to_string(),
        results_count: results.len(),
        user_id: user.map(|u| u.id),
        event_time: Utc::now(),
    });

    Ok(Json(results))
}

/// GET /api/content and /api/content/list
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<ContentRecord>>> {
    let limit = clamp_limit(q.limit, 50, 500);
    let content_type = parse_type(q.r#type.as_deref())?;
    Ok(Json(fetch_content_list(&state, None, content_type, limit).await?))
}

#[derive(Debug, Serialize)]
pub struct AutocompleteItem {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub release_year: Option<i64>,
    pub poster_url: Option<String>,
    pub avg_rating: f64,
}

/// GET /api/content/autocomplete
///
/// Titles starting with the query rank ahead of titles merely containing it.
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(q): Query<AutocompleteQuery>,
) -> ApiResult<Json<Vec<AutocompleteItem>>> {
    let text = q.q.as_deref().map(str::trim).unwrap_or_default();
    if text.chars().count() < 2 {
        return Ok(Json(Vec::new()));
    }
    let limit = clamp_limit(q.limit, 10, 50);

    let rows = sqlx::query(
        r#"
        SELECT id, title, content_type, release_year, poster_url, avg_rating
        FROM content
        WHERE title LIKE ?1
        ORDER BY CASE WHEN title LIKE ?2 THEN 0 ELSE 1 END, avg_rating DESC, reviews_count DESC
        LIMIT ?3
        "#,
    )
    .bind(format!("%{}%", text))
    .bind(format!("{}%", text))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let items = rows
        .iter()
        .map(|row| -> Result<AutocompleteItem, sqlx::Error> {
            Ok(AutocompleteItem {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                content_type: row.try_get("content_type")?,
                release_year: row.try_get("release_year")?,
                poster_url: row.try_get("poster_url")?,
                avg_rating: row.try_get("avg_rating")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

/// GET /api/content/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM content) AS total,
            (SELECT COUNT(*) FROM content WHERE content_type = 'MOVIE') AS movies,
            (SELECT COUNT(*) FROM content WHERE content_type = 'TV_SERIES') AS series,
            (SELECT COUNT(*) FROM content WHERE content_type = 'GAME') AS games,
            (SELECT COUNT(*) FROM hero_carousel WHERE is_active = 1) AS hero_active,
            (SELECT COUNT(*) FROM coming_soon_items WHERE is_active = 1) AS coming_active
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "total": row.try_get::<i64, _>("total")?,
        "byType": {
            "movies": row.try_get::<i64, _>("movies")?,
            "series": row.try_get::<i64, _>("series")?,
            "games": row.try_get::<i64, _>("games")?,
        },
        "heroActive": row.try_get::<i64, _>("hero_active")?,
        "comingActive": row.try_get::<i64, _>("coming_active")?,
    })))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryStat {
    pub country: String,
    pub country_code: &'static str,
    pub reviews_count: i64,
    pub avg_rating: f64,
    pub content_reviewed: i64,
    pub users_count: i64,
}

async fn global_country_stats(state: &AppState) -> ApiResult<Vec<CountryStat>> {
    let rows = sqlx::query(
        r#"
        SELECT u.country AS country,
               COUNT(*) AS reviews_count,
               CAST(AVG(r.rating) AS REAL) AS avg_rating,
               COUNT(DISTINCT r.content_id) AS content_reviewed,
               COUNT(DISTINCT u.id) AS users_count
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE u.country IS NOT NULL AND u.country != '' AND r.rating IS NOT NULL
        GROUP BY u.country
        ORDER BY reviews_count DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| -> Result<CountryStat, sqlx::Error> {
            let country: String = row.try_get("country")?;
            Ok(CountryStat {
                country_code: country_code(&country),
                country,
                reviews_count: row.try_get("reviews_count")?,
                avg_rating: round2(row.try_get("avg_rating")?),
                content_reviewed: row.try_get("content_reviewed")?,
                users_count: row.try_get("users_count")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?)
}

/// GET /api/content/country-stats/global
pub async fn country_stats_global(State(state): State<AppState>) -> ApiResult<Json<Vec<CountryStat>>> {
    Ok(Json(global_country_stats(&state).await?))
}

/// Mean absolute spread of per-country averages around their mean
pub fn avg_difference(averages: &[f64]) -> f64 {
    if averages.is_empty() {
        return 0.0;
    }
    let n = averages.len() as f64;
    let mean = averages.iter().sum::<f64>() / n;
    round2(averages.iter().map(|a| (a - mean).abs()).sum::<f64>() / n)
}

/// GET /api/content/country-ratings/stats
pub async fn country_ratings_summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let countries = global_country_stats(&state).await?;
    let averages: Vec<f64> = countries.iter().map(|c| c.avg_rating).collect();

    Ok(Json(json!({
        "totalCountries": countries.len(),
        "totalRatings": countries.iter().map(|c| c.reviews_count).sum::<i64>(),
        "activeUsers": countries.iter().map(|c| c.users_count).sum::<i64>(),
        "avgDifference": avg_difference(&averages),
        "countries": countries,
    })))
}

// ============================================================================
// Detail
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SentimentStats {
    pub total: i64,
    pub positive: i64,
    pub mixed: i64,
    pub negative: i64,
}

impl SentimentStats {
    fn add(&mut self, kind: &str) {
        self.total += 1;
        match kind {
            "positive" => self.positive += 1,
            "negative" => self.negative += 1,
            _ => self.mixed += 1,
        }
    }
}

/// positive / mixed / negative for a rating on the 0..10 scale
pub fn sentiment(rating: f64, positive_from: f64) -> &'static str {
    if rating >= positive_from {
        "positive"
    } else if rating < NEGATIVE_BELOW {
        "negative"
    } else {
        "mixed"
    }
}

/// First `max` characters, with an ellipsis when the text was cut
pub fn excerpt(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

async fn similar_content(state: &AppState, content: &ContentRecord) -> ApiResult<Vec<Value>> {
    let Some(first_genre) = content.genres().into_iter().next() else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        "SELECT id, title, poster_url, critics_rating, audience_rating FROM content \
         WHERE genre LIKE ? AND id != ? ORDER BY avg_rating DESC LIMIT 3",
    )
    .bind(format!("%{}%", first_genre))
    .bind(content.id)
    .fetch_all(&state.db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| -> Result<Value, sqlx::Error> {
            let critics: f64 = row.try_get("critics_rating")?;
            Ok(json!({
                "id": row.try_get::<i64, _>("id")?,
                "title": row.try_get::<String, _>("title")?,
                "poster": row.try_get::<Option<String>, _>("poster_url")?,
                "metascore": round2(critics * 10.0),
                "userScore": row.try_get::<f64, _>("audience_rating")?,
            }))
        })
        .collect::<Result<Vec<_>, _>>()?)
}

/// Full detail view for a title, `None` when it does not exist
pub async fn content_detail(state: &AppState, id: i64) -> ApiResult<Option<Value>> {
    let Some(content) = find_content(&state.db, id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"
        SELECT r.id, r.content, r.rating, r.aspects, r.emotions, r.created_at,
               u.username, u.avatar_url, u.role,
               p.name AS publication_name, p.logo_url AS publication_logo
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        LEFT JOIN publications p ON p.id = u.publication_id
        WHERE r.content_id = ?
        ORDER BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let mut critic_stats = SentimentStats::default();
    let mut user_stats = SentimentStats::default();
    let mut critic_reviews = Vec::new();
    let mut user_reviews = Vec::new();

    for row in &rows {
        let role: String = row.try_get("role")?;
        let text: String = row.try_get("content")?;
        let rating: Option<f64> = row.try_get("rating")?;
        let created_at: Option<String> = row.try_get("created_at")?;
        let username: String = row.try_get("username")?;

        if role == "CRITIC" {
            let kind = rating.map_or("mixed", |r| sentiment(r, CRITIC_POSITIVE));
            if rating.is_some() {
                critic_stats.add(kind);
            }
            let publication: Option<String> = row.try_get("publication_name")?;
            critic_reviews.push(json!({
                "id": row.try_get::<i64, _>("id")?,
                "publicationName": publication.unwrap_or_else(|| "Independent".to_string()),
                "publicationLogo": row.try_get::<Option<String>, _>("publication_logo")?,
                "criticName": username,
                "score": rating.map(|r| round2(r * 10.0)),
                "excerpt": excerpt(&text, 150),
                "publishDate": created_at,
                "type": kind,
            }));
        } else {
            let kind = rating.map_or("mixed", |r| sentiment(r, USER_POSITIVE));
            if rating.is_some() {
                user_stats.add(kind);
            }
            user_reviews.push(json!({
                "id": row.try_get::<i64, _>("id")?,
                "userName": username,
                "userAvatar": row.try_get::<Option<String>, _>("avatar_url")?,
                "score": rating,
                "title": excerpt(&text, 50),
                "content": text,
                "helpful": 0,
                "notHelpful": 0,
                "containsSpoilers": false,
                "date": created_at,
                "detailedRatings": parse_json(row.try_get("aspects")?).unwrap_or_else(|| json!({})),
                "emotions": parse_json(row.try_get("emotions")?).unwrap_or_else(|| json!({})),
            }));
        }
    }

    let similar = similar_content(state, &content).await?;
    let trailers = match &content.trailer_url {
        Some(url) => json!([{ "title": "Official Trailer", "url": url, "thumbnail": "" }]),
        None => json!([]),
    };
    let technical_info = content.technical_info.clone().unwrap_or_else(|| {
        json!({ "fileSize": content.file_size, "languages": [], "systemRequirements": {} })
    });

    let mut body = match json!(content) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let extra = json!({
        "releaseDate": content.release_year.map(|y| format!("{}-01-01", y)),
        "coverImage": content.poster_url,
        "trailerUrl": content.trailer_url,
        "metascore": round2(content.critics_rating * 10.0),
        "userScore": content.audience_rating,
        "criticReviews": critic_stats,
        "userReviews": user_stats,
        "criticReviewsList": critic_reviews,
        "userReviewsList": user_reviews,
        "similarContent": similar,
        "platforms": content.platforms.clone().unwrap_or_else(|| json!([])),
        "genres": content.genres(),
        "screenshots": [],
        "trailers": trailers,
        "technicalInfo": technical_info,
    });
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }

    Ok(Some(Value::Object(body)))
}

/// GET /api/content/:id
pub async fn get_content(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let detail = content_detail(&state, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Content {} not found", id)))?;

    state.events.emit_lossy(AnalyticsEvent::ContentViewed {
        content_id: id,
        content_type: detail["content_type"].as_str().unwrap_or_default().to_string(),
        user_id: user.map(|u| u.id),
        event_time: Utc::now(),
    });

    Ok(Json(detail))
}

/// GET /api/content/:id/emotional-cloud
pub async fn emotional_cloud(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let cloud = find_content(&state.db, id).await?.and_then(|c| c.emotional_cloud);
    Ok(Json(cloud.unwrap_or_else(|| json!({}))))
}

/// GET /api/content/:id/perception-map
pub async fn perception_map(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let map = find_content(&state.db, id).await?.and_then(|c| c.perception_map);
    Ok(Json(map.unwrap_or_else(|| json!({}))))
}

/// One ISO-week bucket of rated reviews
#[derive(Debug, Clone)]
pub struct WeekBucket {
    pub week: String,
    pub date: String,
    pub avg: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicsPoint {
    pub date: String,
    pub week: String,
    pub weekly_avg: String,
    pub cumulative_avg: String,
    pub review_count: i64,
}

/// Weekly averages plus the count-weighted running average up to each week
pub fn running_averages(buckets: &[WeekBucket]) -> Vec<DynamicsPoint> {
    let mut sum = 0.0;
    let mut count = 0i64;
    buckets
        .iter()
        .map(|b| {
            sum += b.avg * b.count as f64;
            count += b.count;
            DynamicsPoint {
                date: b.date.clone(),
                week: b.week.clone(),
                weekly_avg: format!("{:.2}", b.avg),
                cumulative_avg: format!("{:.2}", sum / count.max(1) as f64),
                review_count: b.count,
            }
        })
        .collect()
}

/// GET /api/content/:id/dynamics
pub async fn dynamics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<DynamicsPoint>>> {
    let rows = sqlx::query(
        r#"
        SELECT strftime('%Y-%W', created_at) AS week,
               MIN(date(created_at)) AS first_day,
               CAST(AVG(rating) AS REAL) AS avg_rating,
               COUNT(*) AS review_count
        FROM reviews
        WHERE content_id = ? AND rating IS NOT NULL
        GROUP BY week
        ORDER BY first_day ASC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let buckets = rows
        .iter()
        .map(|row| -> Result<WeekBucket, sqlx::Error> {
            Ok(WeekBucket {
                week: row.try_get("week")?,
                date: row.try_get("first_day")?,
                avg: row.try_get("avg_rating")?,
                count: row.try_get("review_count")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(running_averages(&buckets)))
}

/// GET /api/content/:id/country-ratings
pub async fn country_ratings(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let content_avg = find_content(&state.db, id).await?.map_or(0.0, |c| c.avg_rating);

    let rows = sqlx::query(
        r#"
        SELECT u.country AS country,
               COUNT(*) AS reviews_count,
               CAST(AVG(r.rating) AS REAL) AS avg_rating,
               CAST(MIN(r.rating) AS REAL) AS min_rating,
               CAST(MAX(r.rating) AS REAL) AS max_rating,
               SUM(CASE WHEN r.rating >= 7 THEN 1 ELSE 0 END) AS positive_count,
               SUM(CASE WHEN r.rating >= 5 AND r.rating < 7 THEN 1 ELSE 0 END) AS mixed_count,
               SUM(CASE WHEN r.rating < 5 THEN 1 ELSE 0 END) AS negative_count
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.content_id = ? AND u.country IS NOT NULL AND u.country != ''
          AND r.rating IS NOT NULL
        GROUP BY u.country
        ORDER BY reviews_count DESC, avg_rating DESC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let mut total = 0i64;
    let mut weighted = 0.0;
    let mut ratings = Vec::with_capacity(rows.len());
    for row in &rows {
        let country: String = row.try_get("country")?;
        let count: i64 = row.try_get("reviews_count")?;
        let avg = round2(row.try_get("avg_rating")?);
        total += count;
        weighted += avg * count as f64;

        ratings.push(json!({
            "countryCode": country_code(&country),
            "country": country,
            "count": count,
            "avgRating": avg,
            "minRating": row.try_get::<f64, _>("min_rating")?,
            "maxRating": row.try_get::<f64, _>("max_rating")?,
            "positiveCount": row.try_get::<i64, _>("positive_count")?,
            "mixedCount": row.try_get::<i64, _>("mixed_count")?,
            "negativeCount": row.try_get::<i64, _>("negative_count")?,
            "difference": round2(avg - content_avg),
        }));
    }

    let global_avg = if total > 0 { round2(weighted / total as f64) } else { 0.0 };
    Ok(Json(json!({
        "ratings": ratings,
        "totalRatings": total,
        "globalAvg": global_avg,
        "countriesCount": rows.len(),
    })))
}

// ============================================================================
// Admin CRUD
// ============================================================================

/// POST /api/content
pub async fn create_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(form): ValidatedJson<ContentForm>,
) -> ApiResult<Json<ContentRecord>> {
    let draft = form.into_draft()?;
    let id = insert_content(&state.db, &draft).await?;
    info!("{} created content {} ({})", admin.username, id, draft.title);

    let content = find_content(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Content {} vanished after insert", id)))?;
    Ok(Json(content))
}

enum Assign {
    Text(Option<String>),
    Int(Option<i64>),
}

/// PUT /api/content/:id
///
/// Only fields present in the body are written.
pub async fn update_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<ContentForm>,
) -> ApiResult<Json<Value>> {
    if find_content(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found(format!("Content {} not found", id)));
    }

    let mut changes: Vec<(&str, Assign)> = Vec::new();
    if let Some(title) = form.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        changes.push(("title", Assign::Text(Some(title.to_string()))));
    }
    if let Some(ct) = parse_type(form.content_type.as_deref())? {
        changes.push(("content_type", Assign::Text(Some(ct.as_str().to_string()))));
    }
    for (column, value) in [
        ("genre", form.genre),
        ("description", form.description),
        ("poster_url", form.poster_url),
        ("trailer_url", form.trailer_url),
        ("director", form.director),
        ("cast_list", form.cast_list),
        ("director_photo_url", form.director_photo_url),
        ("developer", form.developer),
        ("publisher", form.publisher),
        ("esrb_rating", form.esrb_rating),
        ("players", form.players),
        ("file_size", form.file_size),
    ] {
        if value.is_some() {
            changes.push((column, Assign::Text(value)));
        }
    }
    for (column, value) in [("release_year", form.release_year), ("runtime", form.runtime)] {
        if value.is_some() {
            changes.push((column, Assign::Int(value)));
        }
    }
    for (column, value) in [
        ("cast_photos", form.cast_photos.as_ref().and_then(list_value)),
        ("platforms", form.platforms.as_ref().and_then(list_value)),
        ("technical_info", form.technical_info),
    ] {
        if let Some(v) = value {
            changes.push((column, Assign::Text(Some(v.to_string()))));
        }
    }

    if !changes.is_empty() {
        let assignments: Vec<String> = changes.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let sql = format!(
            "UPDATE content SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in changes {
            query = match value {
                Assign::Text(v) => query.bind(v),
                Assign::Int(v) => query.bind(v),
            };
        }
        query.bind(id).execute(&state.db).await?;
        info!("{} updated content {}", admin.username, id);
    } else {
        debug!("Empty update for content {}", id);
    }

    let detail = content_detail(&state, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Content {} not found", id)))?;
    Ok(Json(detail))
}

/// DELETE /api/content/:id
pub async fn delete_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM content WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Content {} not found", id)));
    }
    info!("{} deleted content {}", admin.username, id);
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create_content))
        .route("/list", get(list))
        .route("/search", get(search))
        .route("/autocomplete", get(autocomplete))
        .route("/stats", get(stats))
        .route("/country-stats/global", get(country_stats_global))
        .route("/country-ratings/stats", get(country_ratings_summary))
        .nest("/hero", hero::hero_routes())
        .nest("/hero-carousel", hero::hero_routes())
        .nest("/coming-soon", hero::coming_soon_routes())
        .route("/:id", get(get_content).put(update_content).delete(delete_content))
        .route("/:id/emotional-cloud", get(emotional_cloud))
        .route("/:id/perception-map", get(perception_map))
        .route("/:id/dynamics", get(dynamics))
        .route("/:id/country-ratings", get(country_ratings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_value_normalizes_platforms() {
        assert_eq!(
            list_value(&json!("PC, PS5 ,,Xbox")),
            Some(json!(["PC", "PS5", "Xbox"]))
        );
        assert_eq!(list_value(&json!(["Switch"])), Some(json!(["Switch"])));
        assert_eq!(list_value(&json!(3)), None);
    }

    #[test]
    fn test_sentiment_thresholds_differ_for_critics_and_users() {
        assert_eq!(sentiment(7.2, CRITIC_POSITIVE), "mixed");
        assert_eq!(sentiment(7.2, USER_POSITIVE), "positive");
        assert_eq!(sentiment(4.9, USER_POSITIVE), "negative");
        assert_eq!(sentiment(5.0, CRITIC_POSITIVE), "mixed");
    }

    #[test]
    fn test_excerpt_only_marks_cut_text() {
        assert_eq!(excerpt("short", 50), "short");
        let long = "x".repeat(60);
        let cut = excerpt(&long, 50);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 53);
    }

    #[test]
    fn test_running_average_is_count_weighted() {
        let buckets = vec![
            WeekBucket { week: "2024-01".into(), date: "2024-01-02".into(), avg: 8.0, count: 3 },
            WeekBucket { week: "2024-02".into(), date: "2024-01-09".into(), avg: 4.0, count: 1 },
        ];
        let points = running_averages(&buckets);
        assert_eq!(points[0].cumulative_avg, "8.00");
        assert_eq!(points[1].weekly_avg, "4.00");
        assert_eq!(points[1].cumulative_avg, "7.00");
        assert_eq!(points[1].review_count, 1);
    }

    #[test]
    fn test_avg_difference() {
        assert_eq!(avg_difference(&[]), 0.0);
        assert_eq!(avg_difference(&[6.0, 8.0]), 1.0);
    }

    #[test]
    fn test_create_requires_title() {
        let form = ContentForm {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_draft(), Err(ApiError::BadRequest(_))));

        let form = ContentForm {
            title: Some("Dune".into()),
            content_type: Some("series".into()),
            platforms: Some(json!("PC,Mac")),
            ..Default::default()
        };
        let draft = form.into_draft().unwrap();
        assert_eq!(draft.content_type, ContentType::TvSeries);
        assert_eq!(draft.platforms, Some(json!(["PC", "Mac"])));
    }
}
