//! Profile, progress and watchlist endpoints for the signed-in user

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use cinevibe_common::AnalyticsEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;
use tracing::info;
use validator::Validate;

use super::clamp_limit;
use crate::auth::{hash_password, verify_password, AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    find_content, find_user, ContentSummary, UserProfile, UserRecord, CONTENT_SUMMARY_COLUMNS,
    USER_COLUMNS,
};
use crate::services::{progress, taste};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Trimmed, non-empty value of an optional field
fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn current_user(state: &AppState, user: &AuthUser) -> ApiResult<UserRecord> {
    find_user(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// GET /api/users/me
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserProfile>> {
    Ok(Json(current_user(&state, &user).await?.profile()))
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let record = current_user(&state, &user).await?;

    let mut assignments: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(username) = provided(&req.username).filter(|u| *u != record.username) {
        if taken(&state, "username", username, user.id).await? {
            return Err(ApiError::Conflict("Username already taken".to_string()));
        }
        assignments.push("username = ?");
        values.push(username.to_string());
    }
    if let Some(email) = provided(&req.email).filter(|e| *e != record.email) {
        if taken(&state, "email", email, user.id).await? {
            return Err(ApiError::Conflict("Email already in use".to_string()));
        }
        assignments.push("email = ?");
        values.push(email.to_string());
    }
    for (column, value) in [
        ("avatar_url = ?", &req.avatar_url),
        ("bio = ?", &req.bio),
        ("country = ?", &req.country),
    ] {
        if let Some(v) = provided(value) {
            assignments.push(column);
            values.push(v.to_string());
        }
    }

    if assignments.is_empty() {
        return Ok(Json(record.profile()));
    }

    let sql = format!("UPDATE users SET {} WHERE id = ?", assignments.join(", "));
    let mut query = sqlx::query(&sql);
    for value in &values {
        query = query.bind(value);
    }
    query.bind(user.id).execute(&state.db).await?;

    state.events.emit_lossy(AnalyticsEvent::UserUpdated {
        user_id: user.id,
        event_time: Utc::now(),
    });

    Ok(Json(current_user(&state, &user).await?.profile()))
}

async fn taken(state: &AppState, column: &str, value: &str, except: i64) -> ApiResult<bool> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM users WHERE {} = ? AND id != ?",
        column
    ))
    .bind(value)
    .bind(except)
    .fetch_one(&state.db)
    .await?;
    Ok(count > 0)
}

/// PATCH /api/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let record = current_user(&state, &user).await?;
    if !verify_password(&req.current_password, &record.password_hash)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let hash = hash_password(&req.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hash)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    info!("User {} changed password", user.username);

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// GET /api/users/by-username/:username
pub async fn by_username(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(&username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", username)))?;
    Ok(Json(UserRecord::from_row(&row)?.profile()))
}

/// GET /api/users/me/level
pub async fn my_level(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<progress::LevelInfo>> {
    let count = progress::review_count(&state.db, user.id).await?;
    Ok(Json(progress::LevelInfo::for_reviews(count)))
}

/// GET /api/users/me/achievements
pub async fn my_milestones(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<progress::Milestone>>> {
    let stats = progress::load_stats(&state.db, user.id).await?;
    Ok(Json(progress::milestones(&stats)))
}

/// GET /api/users/leaderboard
pub async fn leaderboard(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<Vec<Value>>> {
    Ok(Json(progress::activity_leaderboard(&state.db).await?))
}

/// GET /api/users/me/taste-profile
pub async fn taste_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<taste::TasteProfile>> {
    Ok(Json(taste::taste_profile(&state.db, user.id).await?))
}

/// GET /api/users/me/recommendations
pub async fn recommendations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<taste::Recommendation>>> {
    let limit = clamp_limit(q.limit, 10, 50) as usize;
    Ok(Json(taste::recommend(&state.db, user.id, limit).await?))
}

/// GET /api/users/me/watchlist
pub async fn watchlist(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Value>>> {
    let rows = sqlx::query(&format!(
        "SELECT w.id, w.created_at AS added_at, {} FROM watchlist w \
         JOIN content c ON c.id = w.content_id \
         WHERE w.user_id = ? ORDER BY w.created_at DESC, w.id DESC",
        CONTENT_SUMMARY_COLUMNS
    ))
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let items = rows
        .iter()
        .map(|row| -> Result<Value, sqlx::Error> {
            Ok(json!({
                "id": row.try_get::<i64, _>("id")?,
                "addedAt": row.try_get::<Option<String>, _>("added_at")?,
                "content": ContentSummary::from_prefixed_row(row)?,
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

/// POST /api/users/me/watchlist/:contentId
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if find_content(&state.db, content_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Content {} not found", content_id)));
    }

    sqlx::query("INSERT OR IGNORE INTO watchlist (user_id, content_id) VALUES (?, ?)")
        .bind(user.id)
        .bind(content_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "status": "added" })))
}

/// DELETE /api/users/me/watchlist/:contentId
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    sqlx::query("DELETE FROM watchlist WHERE user_id = ? AND content_id = ?")
        .bind(user.id)
        .bind(content_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "status": "removed" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/me/password", patch(change_password))
        .route("/me/level", get(my_level))
        .route("/me/achievements", get(my_milestones))
        .route("/me/taste-profile", get(taste_profile))
        .route("/me/recommendations", get(recommendations))
        .route("/me/watchlist", get(watchlist))
        .route(
            "/me/watchlist/:content_id",
            post(add_to_watchlist).delete(remove_from_watchlist),
        )
        .route("/leaderboard", get(leaderboard))
        .route("/by-username/:username", get(by_username))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provided_ignores_blank_values() {
        assert_eq!(provided(&Some("  ann ".into())), Some("ann"));
        assert_eq!(provided(&Some("   ".into())), None);
        assert_eq!(provided(&None), None);
    }
}
