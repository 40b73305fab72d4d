//! Achievements, reputation leaderboard and catalog administration

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::clamp_limit;
use crate::auth::{AdminUser, AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::Achievement;
use crate::services::achievements::{self, AchievementCard};
use crate::AppState;

const ACHIEVEMENT_COLUMNS: &str = "id, name, description, icon_name, xp_reward, category, created_at";

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AchievementForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "iconName", alias = "icon")]
    pub icon_name: Option<String>,
    #[serde(alias = "xpReward", alias = "xp")]
    #[validate(range(min = 0, message = "XP reward cannot be negative"))]
    pub xp_reward: Option<i64>,
    pub category: Option<String>,
}

/// GET /api/gamification/my-achievements
pub async fn my_achievements(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<AchievementCard>>> {
    Ok(Json(achievements::achievements_for_user(&state.db, user.id).await?))
}

/// GET /api/gamification/user/:id
pub async fn user_achievements(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<AchievementCard>>> {
    Ok(Json(achievements::achievements_for_user(&state.db, user_id).await?))
}

/// GET /api/gamification/leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let limit = clamp_limit(q.limit, 10, 100);
    Ok(Json(achievements::reputation_leaderboard(&state.db, limit).await?))
}

/// GET /api/gamification/level/:userId
pub async fn level(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Json<Value>> {
    achievements::level_view(&state.db, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", user_id)))
}

async fn load_achievement(state: &AppState, id: i64) -> ApiResult<Achievement> {
    let row = sqlx::query(&format!("SELECT {} FROM achievements WHERE id = ?", ACHIEVEMENT_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Achievement {} not found", id)))?;
    Ok(Achievement::from_row(&row)?)
}

/// GET /api/gamification/all
pub async fn all_achievements(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Achievement>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM achievements ORDER BY xp_reward ASC, id ASC",
        ACHIEVEMENT_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(
        rows.iter()
            .map(Achievement::from_row)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// POST /api/gamification
pub async fn create_achievement(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(form): ValidatedJson<AchievementForm>,
) -> ApiResult<Json<Achievement>> {
    let name = form
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let result = sqlx::query(
        "INSERT INTO achievements (name, description, icon_name, xp_reward, category) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(&form.description)
    .bind(&form.icon_name)
    .bind(form.xp_reward.unwrap_or(0))
    .bind(form.category.as_deref().unwrap_or("general"))
    .execute(&state.db)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if unique_violation(&e) => {
            return Err(ApiError::Conflict(format!("Achievement '{}' already exists", name)))
        }
        Err(e) => return Err(e.into()),
    };

    info!("{} created achievement '{}'", admin.username, name);
    Ok(Json(load_achievement(&state, id).await?))
}

/// PUT /api/gamification/:id
pub async fn update_achievement(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<AchievementForm>,
) -> ApiResult<Json<Achievement>> {
    let current = load_achievement(&state, id).await?;
    let name = form
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or(current.name);

    let result = sqlx::query(
        "UPDATE achievements SET name = ?, description = ?, icon_name = ?, xp_reward = ?, \
         category = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(form.description.or(current.description))
    .bind(form.icon_name.or(current.icon_name))
    .bind(form.xp_reward.unwrap_or(current.xp_reward))
    .bind(form.category.unwrap_or(current.category))
    .bind(id)
    .execute(&state.db)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if unique_violation(&e) => {
            return Err(ApiError::Conflict(format!("Achievement '{}' already exists", name)))
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Json(load_achievement(&state, id).await?))
}

/// DELETE /api/gamification/:id
pub async fn delete_achievement(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM achievements WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Achievement {} not found", id)));
    }
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_achievement))
        .route("/my-achievements", get(my_achievements))
        .route("/user/:user_id", get(user_achievements))
        .route("/leaderboard", get(leaderboard))
        .route("/level/:user_id", get(level))
        .route("/all", get(all_achievements))
        .route("/:id", put(update_achievement).delete(delete_achievement))
}
