//! Administration: dashboard, user moderation and TMDB import
//!
//! Every handler takes [`AdminUser`], so non-admins get 403 before any work.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use cinevibe_common::UserRole;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::Row;
use tracing::{info, warn};

use super::clamp_limit;
use super::reviews::{load_review, remove_review};
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{find_user, ReviewView, UserProfile, UserRecord, USER_COLUMNS};
use crate::services::tmdb::{TmdbError, TmdbKind};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleFilter {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSearchQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbPageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    #[serde(default)]
    pub tmdb_ids: Vec<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Per-id outcome lists of a bulk import
#[derive(Debug, Default, Serialize)]
pub struct BulkImportReport {
    pub success: Vec<Value>,
    pub failed: Vec<Value>,
    pub skipped: Vec<Value>,
}

impl BulkImportReport {
    /// File one import result under the matching list
    pub fn record(&mut self, tmdb_id: i64, result: Result<(i64, String), TmdbError>) {
        match result {
            Ok((id, title)) => self
                .success
                .push(json!({ "tmdbId": tmdb_id, "id": id, "title": title })),
            Err(TmdbError::Duplicate(title)) => self.skipped.push(json!({
                "tmdbId": tmdb_id,
                "title": title,
                "reason": "Already exists",
            })),
            Err(TmdbError::NotFound(_)) => self
                .failed
                .push(json!({ "tmdbId": tmdb_id, "reason": "Not found in TMDB" })),
            Err(e) => self
                .failed
                .push(json!({ "tmdbId": tmdb_id, "reason": e.to_string() })),
        }
    }
}

fn parse_kind(raw: Option<&str>) -> ApiResult<TmdbKind> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("movie") | Some("movies") => Ok(TmdbKind::Movie),
        Some("tv") | Some("tv_series") | Some("series") => Ok(TmdbKind::Tv),
        Some(other) => Err(ApiError::bad_request(format!("Unknown import type: {}", other))),
    }
}

// ============================================================================
// Dashboard
// ============================================================================

async fn count(state: &AppState, sql: &str) -> ApiResult<i64> {
    Ok(sqlx::query_scalar(sql).fetch_one(&state.db).await?)
}

/// GET /api/admin/stats
pub async fn dashboard_stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Value>> {
    let total_users = count(&state, "SELECT COUNT(*) FROM users").await?;
    let active_users = count(&state, "SELECT COUNT(*) FROM users WHERE is_active = 1").await?;
    let admins = count(&state, "SELECT COUNT(*) FROM users WHERE role = 'ADMIN'").await?;
    let critics = count(&state, "SELECT COUNT(*) FROM users WHERE role = 'CRITIC'").await?;
    let regular = count(&state, "SELECT COUNT(*) FROM users WHERE role = 'USER'").await?;

    let total_content = count(&state, "SELECT COUNT(*) FROM content").await?;
    let movies = count(&state, "SELECT COUNT(*) FROM content WHERE content_type = 'MOVIE'").await?;
    let series = count(&state, "SELECT COUNT(*) FROM content WHERE content_type = 'TV_SERIES'").await?;
    let games = count(&state, "SELECT COUNT(*) FROM content WHERE content_type = 'GAME'").await?;

    let total_reviews = count(&state, "SELECT COUNT(*) FROM reviews").await?;
    let avg_rating: Option<f64> = sqlx::query_scalar("SELECT CAST(AVG(rating) AS REAL) FROM reviews")
        .fetch_one(&state.db)
        .await?;

    let activity = sqlx::query(
        "SELECT date(created_at) AS date, COUNT(*) AS count FROM reviews \
         WHERE created_at >= datetime('now', '-7 days') \
         GROUP BY date(created_at) ORDER BY date ASC",
    )
    .fetch_all(&state.db)
    .await?
    .iter()
    .map(|row| -> Result<Value, sqlx::Error> {
        Ok(json!({
            "date": row.try_get::<String, _>("date")?,
            "count": row.try_get::<i64, _>("count")?,
        }))
    })
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({
        "users": {
            "total": total_users,
            "active": active_users,
            "inactive": total_users - active_users,
            "byRole": { "admins": admins, "critics": critics, "users": regular },
        },
        "content": {
            "total": total_content,
            "byType": { "movies": movies, "series": series, "games": games },
        },
        "reviews": {
            "total": total_reviews,
            "avgRating": avg_rating.map(|v| (v * 10.0).round() / 10.0).unwrap_or(0.0),
            "activity": activity,
        },
        "system": {
            "database": "connected",
            "tmdb": if state.tmdb.is_configured() { "configured" } else { "missing" },
            "version": env!("CARGO_PKG_VERSION"),
        },
    })))
}

// ============================================================================
// Users
// ============================================================================

async fn load_user(state: &AppState, id: i64) -> ApiResult<UserRecord> {
    find_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// GET /api/admin/users?role=CRITIC
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<RoleFilter>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let role = q
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(str::parse::<UserRole>)
        .transpose()?;

    let mut sql = format!("SELECT {} FROM users", USER_COLUMNS);
    if role.is_some() {
        sql.push_str(" WHERE role = ?");
    }
    sql.push_str(" ORDER BY registration_date DESC, id DESC");

    let mut query = sqlx::query(&sql);
    if let Some(role) = role {
        query = query.bind(role.as_str());
    }
    let rows = query.fetch_all(&state.db).await?;

    Ok(Json(
        rows.iter()
            .map(|row| UserRecord::from_row(row).map(|u| u.profile()))
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// GET /api/admin/users/top?limit=10
pub async fn top_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let limit = clamp_limit(q.limit, 10, 100);
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE is_active = 1 ORDER BY reputation DESC, id ASC LIMIT ?",
        USER_COLUMNS
    ))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.iter()
            .map(|row| UserRecord::from_row(row).map(|u| u.profile()))
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// PATCH /api/admin/users/:id/status
pub async fn update_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<UserProfile>> {
    load_user(&state, user_id).await?;

    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(req.is_active)
        .bind(user_id)
        .execute(&state.db)
        .await?;

    info!(
        "{} set user {} active={}",
        admin.username, user_id, req.is_active
    );
    Ok(Json(load_user(&state, user_id).await?.profile()))
}

/// PATCH /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<Json<UserProfile>> {
    let role: UserRole = req.role.parse()?;
    load_user(&state, user_id).await?;

    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id)
        .execute(&state.db)
        .await?;

    info!("{} changed role of user {} to {}", admin.username, user_id, role);
    Ok(Json(load_user(&state, user_id).await?.profile()))
}

/// DELETE /api/admin/users/:id
///
/// Reviews, votes, achievements, watchlist, follows, expectations and
/// recommendations go with the user through `ON DELETE CASCADE`.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user = load_user(&state, user_id).await?;
    if user.id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let reviewed: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT content_id FROM reviews WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&state.db)
            .await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    for content_id in reviewed {
        crate::services::content_stats::recalculate(&state.db, content_id).await?;
    }

    info!("{} deleted user {} ({})", admin.username, user.username, user_id);
    Ok(Json(json!({ "message": "User deleted successfully", "userId": user_id })))
}

// ============================================================================
// Reviews
// ============================================================================

/// GET /api/admin/reviews (latest 100)
pub async fn list_reviews(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<ReviewView>>> {
    let rows = sqlx::query(
        "SELECT r.*, u.username, u.avatar_url, c.title AS content_title \
         FROM reviews r \
         JOIN users u ON u.id = r.user_id \
         LEFT JOIN content c ON c.id = r.content_id \
         ORDER BY r.created_at DESC, r.id DESC LIMIT 100",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.iter()
            .map(ReviewView::from_row)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// DELETE /api/admin/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let review = load_review(&state, id).await?;
    remove_review(&state, &review).await?;
    info!("{} deleted review {}", admin.username, id);
    Ok(Json(json!({ "message": "Review deleted" })))
}

// ============================================================================
// TMDB
// ============================================================================

/// GET /api/admin/tmdb/status
pub async fn tmdb_status(State(state): State<AppState>, _admin: AdminUser) -> Json<Value> {
    Json(json!({
        "tmdb": {
            "configured": state.tmdb.is_configured(),
        }
    }))
}

async fn tmdb_search(state: &AppState, kind: TmdbKind, q: TmdbSearchQuery) -> ApiResult<Json<Value>> {
    let query = q
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter is required"))?;
    Ok(Json(state.tmdb.search(kind, query, q.page.unwrap_or(1)).await?))
}

/// GET /api/admin/tmdb/search/movies
pub async fn tmdb_search_movies(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<TmdbSearchQuery>,
) -> ApiResult<Json<Value>> {
    tmdb_search(&state, TmdbKind::Movie, q).await
}

/// GET /api/admin/tmdb/search/tv
pub async fn tmdb_search_tv(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<TmdbSearchQuery>,
) -> ApiResult<Json<Value>> {
    tmdb_search(&state, TmdbKind::Tv, q).await
}

/// GET /api/admin/tmdb/popular
pub async fn tmdb_popular(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<TmdbPageQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.tmdb.movie_list("popular", q.page.unwrap_or(1)).await?))
}

/// GET /api/admin/tmdb/top-rated
pub async fn tmdb_top_rated(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<TmdbPageQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.tmdb.movie_list("top_rated", q.page.unwrap_or(1)).await?))
}

/// GET /api/admin/tmdb/upcoming
pub async fn tmdb_upcoming(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<TmdbPageQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.tmdb.movie_list("upcoming", q.page.unwrap_or(1)).await?))
}

async fn import_one(state: &AppState, admin: &str, kind: TmdbKind, tmdb_id: i64) -> ApiResult<Json<Value>> {
    let (id, title) = state.tmdb.import(&state.db, &state.events, kind, tmdb_id).await?;
    info!("{} imported TMDB {} as content {}", admin, tmdb_id, id);

    let message = match kind {
        TmdbKind::Movie => "Movie imported successfully",
        TmdbKind::Tv => "TV series imported successfully",
    };
    Ok(Json(json!({ "message": message, "id": id, "title": title })))
}

/// POST /api/admin/tmdb/import/movie/:tmdbId
pub async fn import_movie(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(tmdb_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    import_one(&state, &admin.username, TmdbKind::Movie, tmdb_id).await
}

/// POST /api/admin/tmdb/import/tv/:tmdbId
pub async fn import_tv(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(tmdb_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    import_one(&state, &admin.username, TmdbKind::Tv, tmdb_id).await
}

/// POST /api/admin/tmdb/import/bulk
pub async fn import_bulk(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BulkImportRequest>,
) -> ApiResult<Json<BulkImportReport>> {
    if req.tmdb_ids.is_empty() {
        return Err(ApiError::bad_request("tmdbIds array is required"));
    }
    let kind = parse_kind(req.kind.as_deref())?;
    if !state.tmdb.is_configured() {
        return Err(TmdbError::NotConfigured.into());
    }

    let mut report = BulkImportReport::default();
    for tmdb_id in req.tmdb_ids {
        let result = state.tmdb.import(&state.db, &state.events, kind, tmdb_id).await;
        if let Err(e) = &result {
            warn!("Bulk import of TMDB {} failed: {}", tmdb_id, e);
        }
        report.record(tmdb_id, result);
    }

    info!(
        "{} bulk import: {} imported, {} skipped, {} failed",
        admin.username,
        report.success.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(Json(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard_stats))
        .route("/users", get(list_users))
        .route("/users/top", get(top_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/status", patch(update_user_status))
        .route("/users/:id/role", patch(update_user_role))
        .route("/reviews", get(list_reviews))
        .route("/reviews/:id", delete(delete_review))
        .route("/tmdb/status", get(tmdb_status))
        .route("/tmdb/search/movies", get(tmdb_search_movies))
        .route("/tmdb/search/tv", get(tmdb_search_tv))
        .route("/tmdb/popular", get(tmdb_popular))
        .route("/tmdb/top-rated", get(tmdb_top_rated))
        .route("/tmdb/upcoming", get(tmdb_upcoming))
        .route("/tmdb/import/movie/:tmdb_id", post(import_movie))
        .route("/tmdb/import/tv/:tmdb_id", post(import_tv))
        .route("/tmdb/import/bulk", post(import_bulk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(None).unwrap(), TmdbKind::Movie);
        assert_eq!(parse_kind(Some("TV")).unwrap(), TmdbKind::Tv);
        assert!(parse_kind(Some("game")).is_err());
    }

    #[test]
    fn test_bulk_report_sorts_outcomes() {
        let mut report = BulkImportReport::default();
        report.record(1, Ok((10, "Dune".to_string())));
        report.record(2, Err(TmdbError::Duplicate("Alien".to_string())));
        report.record(3, Err(TmdbError::NotFound("/movie/3".to_string())));
        report.record(4, Err(TmdbError::Network("timeout".to_string())));

        assert_eq!(report.success.len(), 1);
        assert_eq!(report.success[0]["id"], 10);
        assert_eq!(report.skipped[0]["reason"], "Already exists");
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0]["reason"], "Not found in TMDB");
    }
}
