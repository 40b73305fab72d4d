//! Critics directory, follows, personalized ratings and publications

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{round2, Publication};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CriticSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub registration_date: Option<String>,
    pub review_count: i64,
    pub avg_rating_given: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followed_at: Option<String>,
}

impl CriticSummary {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
            registration_date: row.try_get("registration_date")?,
            review_count: row.try_get("review_count")?,
            avg_rating_given: round2(row.try_get("avg_rating_given")?),
            followed_at: row.try_get("followed_at").ok().flatten(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRating {
    pub personal_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedQuery {
    pub content_ids: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublicationForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(alias = "logoUrl")]
    pub logo_url: Option<String>,
    pub website: Option<String>,
}

/// Parse `1,2, 3` into ids, skipping anything that is not a number
pub fn parse_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .collect()
}

/// GET /api/critics
pub async fn list_critics(State(state): State<AppState>) -> ApiResult<Json<Vec<CriticSummary>>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.email, u.role, u.registration_date,
               COUNT(DISTINCT r.id) AS review_count,
               CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS avg_rating_given
        FROM users u
        LEFT JOIN reviews r ON r.user_id = u.id
        WHERE u.role = 'CRITIC'
        GROUP BY u.id
        ORDER BY review_count DESC, u.username ASC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.iter()
            .map(CriticSummary::from_row)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// GET /api/critics/followed
pub async fn followed_critics(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<CriticSummary>>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.email, u.role, u.registration_date,
               f.created_at AS followed_at,
               COUNT(DISTINCT r.id) AS review_count,
               CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS avg_rating_given
        FROM user_critic_preferences f
        JOIN users u ON u.id = f.critic_id
        LEFT JOIN reviews r ON r.user_id = u.id
        WHERE f.user_id = ? AND u.role = 'CRITIC'
        GROUP BY u.id, f.created_at
        ORDER BY f.created_at DESC, f.id DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.iter()
            .map(CriticSummary::from_row)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

async fn require_critic(state: &AppState, critic_id: i64) -> ApiResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ? AND role = 'CRITIC'")
        .bind(critic_id)
        .fetch_optional(&state.db)
        .await?;
    if found.is_none() {
        return Err(ApiError::not_found("Critic not found"));
    }
    Ok(())
}

/// POST /api/critics/:id/follow
pub async fn follow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(critic_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_critic(&state, critic_id).await?;

    sqlx::query("INSERT OR IGNORE INTO user_critic_preferences (user_id, critic_id) VALUES (?, ?)")
        .bind(user.id)
        .bind(critic_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Critic followed successfully" })))
}

/// DELETE /api/critics/:id/follow
pub async fn unfollow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(critic_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_critic(&state, critic_id).await?;

    sqlx::query("DELETE FROM user_critic_preferences WHERE user_id = ? AND critic_id = ?")
        .bind(user.id)
        .bind(critic_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Critic unfollowed successfully" })))
}

/// Average rating from followed critics, per content id
async fn personal_ratings(
    state: &AppState,
    user_id: i64,
    content_ids: &[i64],
) -> ApiResult<Vec<(i64, PersonalRating)>> {
    if content_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; content_ids.len()].join(", ");
    let sql = format!(
        "SELECT r.content_id, CAST(AVG(r.rating) AS REAL) AS personal_rating, COUNT(r.id) AS review_count \
         FROM reviews r \
         JOIN user_critic_preferences f ON f.critic_id = r.user_id \
         WHERE f.user_id = ? AND r.content_id IN ({}) AND r.rating IS NOT NULL \
         GROUP BY r.content_id",
        placeholders
    );
    let mut query = sqlx::query(&sql).bind(user_id);
    for id in content_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&state.db).await?;

    Ok(rows
        .iter()
        .map(|row| -> Result<(i64, PersonalRating), sqlx::Error> {
            let avg: Option<f64> = row.try_get("personal_rating")?;
            Ok((
                row.try_get("content_id")?,
                PersonalRating {
                    personal_rating: avg.map(round2),
                    review_count: row.try_get("review_count")?,
                },
            ))
        })
        .collect::<Result<Vec<_>, _>>()?)
}

/// GET /api/critics/personalized?contentIds=1,2
pub async fn personalized_many(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<PersonalizedQuery>,
) -> ApiResult<Json<Map<String, Value>>> {
    let ids = q.content_ids.as_deref().map(parse_ids).unwrap_or_default();
    let ratings = personal_ratings(&state, user.id, &ids).await?;

    let map = ratings
        .into_iter()
        .map(|(id, rating)| (id.to_string(), json!(rating)))
        .collect();
    Ok(Json(map))
}

/// GET /api/critics/personalized/:contentId
pub async fn personalized_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<PersonalRating>> {
    let rating = personal_ratings(&state, user.id, &[content_id])
        .await?
        .into_iter()
        .next()
        .map(|(_, r)| r)
        .unwrap_or(PersonalRating {
            personal_rating: None,
            review_count: 0,
        });
    Ok(Json(rating))
}

// ============================================================================
// Publications
// ============================================================================

const PUBLICATION_COLUMNS: &str = "id, name, logo_url, website, created_at";

async fn load_publication(state: &AppState, id: i64) -> ApiResult<Publication> {
    let row = sqlx::query(&format!("SELECT {} FROM publications WHERE id = ?", PUBLICATION_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Publication {} not found", id)))?;
    Ok(Publication::from_row(&row)?)
}

/// GET /api/critics/publications and /publications/all
pub async fn list_publications(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Publication>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM publications ORDER BY name ASC",
        PUBLICATION_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(
        rows.iter()
            .map(Publication::from_row)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// POST /api/critics/publications
pub async fn create_publication(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(form): ValidatedJson<PublicationForm>,
) -> ApiResult<Json<Publication>> {
    let name = form
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let id = sqlx::query("INSERT INTO publications (name, logo_url, website) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&form.logo_url)
        .bind(&form.website)
        .execute(&state.db)
        .await?
        .last_insert_rowid();

    info!("{} created publication '{}'", admin.username, name);
    Ok(Json(load_publication(&state, id).await?))
}

/// PUT /api/critics/publications/:id
pub async fn update_publication(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<PublicationForm>,
) -> ApiResult<Json<Publication>> {
    let current = load_publication(&state, id).await?;
    let name = form
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or(current.name);

    sqlx::query("UPDATE publications SET name = ?, logo_url = ?, website = ? WHERE id = ?")
        .bind(name)
        .bind(form.logo_url.or(current.logo_url))
        .bind(form.website.or(current.website))
        .bind(id)
        .execute(&state.db)
        .await?;

    Ok(Json(load_publication(&state, id).await?))
}

/// DELETE /api/critics/publications/:id
pub async fn delete_publication(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM publications WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Publication {} not found", id)));
    }
    Ok(Json(json!({ "message": "Publication deleted" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_critics))
        .route("/followed", get(followed_critics))
        .route("/personalized", get(personalized_many))
        .route("/personalized/:content_id", get(personalized_one))
        .route("/publications", get(list_publications).post(create_publication))
        .route("/publications/all", get(list_publications))
        .route(
            "/publications/:id",
            put(update_publication).delete(delete_publication),
        )
        .route("/:id/follow", post(follow).delete(unfollow))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_skips_garbage() {
        assert_eq!(parse_ids("1, 2,x,,30"), vec![1, 2, 30]);
        assert!(parse_ids("").is_empty());
    }
}
