//! Pre-release expectation ratings

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::Row;
use validator::Validate;

use crate::auth::{AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{find_content, round2};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ExpectationRequest {
    #[validate(range(min = 1.0, max = 10.0, message = "Rating must be between 1 and 10"))]
    pub rating: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationSummary {
    pub avg_rating: f64,
    pub count: i64,
}

/// POST /api/expectations/:contentId
pub async fn set_expectation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ExpectationRequest>,
) -> ApiResult<Json<Value>> {
    if find_content(&state.db, content_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Content {} not found", content_id)));
    }

    sqlx::query(
        "INSERT INTO expectations (user_id, content_id, rating) VALUES (?, ?, ?) \
         ON CONFLICT(user_id, content_id) DO UPDATE SET rating = excluded.rating",
    )
    .bind(user.id)
    .bind(content_id)
    .bind(req.rating)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({
        "user_id": user.id,
        "content_id": content_id,
        "rating": req.rating,
    })))
}

/// GET /api/expectations/:contentId/me
pub async fn my_expectation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let rating: Option<f64> = sqlx::query_scalar(
        "SELECT rating FROM expectations WHERE user_id = ? AND content_id = ?",
    )
    .bind(user.id)
    .bind(content_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(json!({ "rating": rating })))
}

/// GET /api/expectations/:contentId
pub async fn content_expectations(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<ExpectationSummary>> {
    let row = sqlx::query(
        "SELECT CAST(COALESCE(AVG(rating), 0) AS REAL) AS avg_rating, COUNT(id) AS count \
         FROM expectations WHERE content_id = ?",
    )
    .bind(content_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ExpectationSummary {
        avg_rating: round2(row.try_get("avg_rating")?),
        count: row.try_get("count")?,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:content_id", get(content_expectations).post(set_expectation))
        .route("/:content_id/me", get(my_expectation))
}
