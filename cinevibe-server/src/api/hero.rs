//! Home page hero carousel and "coming soon" shelf, nested under /api/content

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{find_content, ComingSoonItem, HeroSlide, CONTENT_SUMMARY_COLUMNS};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HeroQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeroForm {
    #[serde(alias = "contentId")]
    pub content_id: Option<i64>,
    #[serde(alias = "displayOrder")]
    pub display_order: Option<i64>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
    #[serde(alias = "customTitle", alias = "title")]
    pub custom_title: Option<String>,
    #[serde(alias = "customDescription", alias = "description")]
    pub custom_description: Option<String>,
    #[serde(alias = "backgroundImage")]
    pub background_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComingSoonForm {
    pub title: Option<String>,
    #[serde(alias = "type", alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(alias = "releaseDate")]
    pub release_date: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "posterUrl")]
    pub poster_url: Option<String>,
    #[serde(alias = "trailerUrl")]
    pub trailer_url: Option<String>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

fn hero_select(filter: &str, order: &str) -> String {
    format!(
        "SELECT h.id, h.content_id, h.display_order, h.is_active, h.custom_title, \
         h.custom_description, h.background_image, h.created_at, h.updated_at, {} \
         FROM hero_carousel h LEFT JOIN content c ON c.id = h.content_id {} ORDER BY {}",
        CONTENT_SUMMARY_COLUMNS, filter, order
    )
}

async fn load_slides(state: &AppState, sql: &str) -> ApiResult<Vec<HeroSlide>> {
    let rows = sqlx::query(sql).fetch_all(&state.db).await?;
    Ok(rows
        .iter()
        .map(HeroSlide::from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn load_slide(state: &AppState, id: i64) -> ApiResult<HeroSlide> {
    let row = sqlx::query(&hero_select("WHERE h.id = ?", "h.id"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Hero slide {} not found", id)))?;
    Ok(HeroSlide::from_row(&row)?)
}

async fn require_content(state: &AppState, content_id: i64) -> ApiResult<()> {
    if find_content(&state.db, content_id).await?.is_none() {
        return Err(ApiError::bad_request(format!(
            "Content with ID {} not found",
            content_id
        )));
    }
    Ok(())
}

/// GET /hero/active (public); `sort=latest` orders by last update
pub async fn active_slides(
    State(state): State<AppState>,
    Query(q): Query<HeroQuery>,
) -> ApiResult<Json<Vec<HeroSlide>>> {
    let order = match q.sort.as_deref() {
        Some("latest") => "h.updated_at DESC, h.id DESC",
        _ => "h.display_order ASC, h.id ASC",
    };
    let sql = hero_select("WHERE h.is_active = 1", order);
    Ok(Json(load_slides(&state, &sql).await?))
}

/// GET /hero/all
pub async fn all_slides(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<HeroSlide>>> {
    let sql = hero_select("", "h.display_order ASC, h.id ASC");
    Ok(Json(load_slides(&state, &sql).await?))
}

/// POST /hero
pub async fn create_slide(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(form): Json<HeroForm>,
) -> ApiResult<Json<HeroSlide>> {
    let content_id = form
        .content_id
        .ok_or_else(|| ApiError::bad_request("content_id is required"))?;
    require_content(&state, content_id).await?;

    let id = sqlx::query(
        "INSERT INTO hero_carousel (content_id, display_order, is_active, custom_title, \
         custom_description, background_image) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(content_id)
    .bind(form.display_order.unwrap_or(0))
    .bind(form.is_active.unwrap_or(true))
    .bind(&form.custom_title)
    .bind(&form.custom_description)
    .bind(&form.background_image)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    info!("{} added hero slide {} for content {}", admin.username, id, content_id);
    Ok(Json(load_slide(&state, id).await?))
}

/// PUT /hero/:id
pub async fn update_slide(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(form): Json<HeroForm>,
) -> ApiResult<Json<HeroSlide>> {
    let current = load_slide(&state, id).await?;
    if let Some(content_id) = form.content_id {
        require_content(&state, content_id).await?;
    }

    sqlx::query(
        "UPDATE hero_carousel SET content_id = ?, display_order = ?, is_active = ?, \
         custom_title = ?, custom_description = ?, background_image = ?, \
         updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(form.content_id.unwrap_or(current.content_id))
    .bind(form.display_order.unwrap_or(current.display_order))
    .bind(form.is_active.unwrap_or(current.is_active))
    .bind(form.custom_title.or(current.custom_title))
    .bind(form.custom_description.or(current.custom_description))
    .bind(form.background_image.or(current.background_image))
    .bind(id)
    .execute(&state.db)
    .await?;

    Ok(Json(load_slide(&state, id).await?))
}

/// DELETE /hero/:id
pub async fn delete_slide(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM hero_carousel WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Hero slide {} not found", id)));
    }
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

pub fn hero_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_slide))
        .route("/active", get(active_slides))
        .route("/all", get(all_slides))
        .route("/:id", put(update_slide).delete(delete_slide))
}

// ============================================================================
// Coming soon
// ============================================================================

const COMING_SOON_COLUMNS: &str = "id, title, content_type, release_date, description, poster_url, \
    trailer_url, is_active, created_at, updated_at";

async fn load_items(state: &AppState, filter: &str) -> ApiResult<Vec<ComingSoonItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM coming_soon_items {} ORDER BY release_date ASC, id ASC",
        COMING_SOON_COLUMNS, filter
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(rows
        .iter()
        .map(ComingSoonItem::from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn load_item(state: &AppState, id: i64) -> ApiResult<ComingSoonItem> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM coming_soon_items WHERE id = ?",
        COMING_SOON_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Coming soon item {} not found", id)))?;
    Ok(ComingSoonItem::from_row(&row)?)
}

fn content_type_name(raw: Option<&str>) -> ApiResult<Option<&'static str>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(Some(s.parse::<cinevibe_common::ContentType>()?.as_str())),
        None => Ok(None),
    }
}

/// GET /coming-soon/active (public)
pub async fn active_items(State(state): State<AppState>) -> ApiResult<Json<Vec<ComingSoonItem>>> {
    Ok(Json(load_items(&state, "WHERE is_active = 1").await?))
}

/// GET /coming-soon/all
pub async fn all_items(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<ComingSoonItem>>> {
    Ok(Json(load_items(&state, "").await?))
}

/// POST /coming-soon
pub async fn create_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(form): Json<ComingSoonForm>,
) -> ApiResult<Json<ComingSoonItem>> {
    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let content_type = content_type_name(form.content_type.as_deref())?.unwrap_or("MOVIE");

    let id = sqlx::query(
        "INSERT INTO coming_soon_items (title, content_type, release_date, description, \
         poster_url, trailer_url, is_active) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(content_type)
    .bind(&form.release_date)
    .bind(&form.description)
    .bind(&form.poster_url)
    .bind(&form.trailer_url)
    .bind(form.is_active.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    Ok(Json(load_item(&state, id).await?))
}

/// PUT /coming-soon/:id
pub async fn update_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(form): Json<ComingSoonForm>,
) -> ApiResult<Json<ComingSoonItem>> {
    let current = load_item(&state, id).await?;
    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or(current.title);
    let content_type = content_type_name(form.content_type.as_deref())?
        .map(str::to_string)
        .unwrap_or(current.content_type);

    sqlx::query(
        "UPDATE coming_soon_items SET title = ?, content_type = ?, release_date = ?, \
         description = ?, poster_url = ?, trailer_url = ?, is_active = ?, \
         updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(title)
    .bind(content_type)
    .bind(form.release_date.or(current.release_date))
    .bind(form.description.or(current.description))
    .bind(form.poster_url.or(current.poster_url))
    .bind(form.trailer_url.or(current.trailer_url))
    .bind(form.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;

    Ok(Json(load_item(&state, id).await?))
}

/// DELETE /coming-soon/:id
pub async fn delete_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM coming_soon_items WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Coming soon item {} not found", id)));
    }
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

pub fn coming_soon_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_item))
        .route("/active", get(active_items))
        .route("/all", get(all_items))
        .route("/:id", put(update_item).delete(delete_item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hero_select_joins_content() {
        let sql = hero_select("WHERE h.is_active = 1", "h.display_order ASC");
        assert!(sql.contains("LEFT JOIN content c"));
        assert!(sql.contains("c.id AS c_id"));
        assert!(sql.ends_with("ORDER BY h.display_order ASC"));
    }

    #[test]
    fn test_content_type_name() {
        assert_eq!(content_type_name(Some("game")).unwrap(), Some("GAME"));
        assert_eq!(content_type_name(Some(" ")).unwrap(), None);
        assert!(content_type_name(Some("opera")).is_err());
    }
}
