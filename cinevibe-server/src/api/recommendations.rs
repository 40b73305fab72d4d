//! Stored recommendations and their regeneration

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::Row;
use tracing::info;

use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::models::{ContentSummary, CONTENT_SUMMARY_COLUMNS};
use crate::services::taste;
use crate::AppState;

const STORED_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct StoredRecommendation {
    pub id: i64,
    pub user_id: i64,
    pub content_id: i64,
    pub score: f64,
    pub reason: Option<String>,
    pub created_at: Option<String>,
    pub content: ContentSummary,
}

/// GET /api/recommendations
pub async fn my_recommendations(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<StoredRecommendation>>> {
    let rows = sqlx::query(&format!(
        "SELECT r.id, r.user_id, r.content_id, r.score, r.reason, r.created_at, {} \
         FROM recommendations r JOIN content c ON c.id = r.content_id \
         WHERE r.user_id = ? ORDER BY r.score DESC, r.id ASC LIMIT ?",
        CONTENT_SUMMARY_COLUMNS
    ))
    .bind(user.id)
    .bind(STORED_LIMIT)
    .fetch_all(&state.db)
    .await?;

    let picks = rows
        .iter()
        .map(|row| -> Result<StoredRecommendation, sqlx::Error> {
            Ok(StoredRecommendation {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                content_id: row.try_get("content_id")?,
                score: row.try_get("score")?,
                reason: row.try_get("reason")?,
                created_at: row.try_get("created_at")?,
                content: ContentSummary::from_prefixed_row(row)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(picks))
}

/// POST /api/recommendations/generate
pub async fn generate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<Value>> {
    info!("{} requested recommendation generation", admin.username);
    let generated = taste::generate_all(&state.db).await?;

    Ok(Json(json!({
        "message": "Recommendations generated successfully",
        "generated": generated,
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(my_recommendations))
        .route("/generate", post(generate))
}
