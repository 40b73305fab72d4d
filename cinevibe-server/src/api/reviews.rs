//! Reviews: posting (viewer and critic), editing, moderation, listings and votes
//!
//! Every write recomputes the reviewed title's aggregates before returning,
//! so detail pages never show stale scores.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use cinevibe_common::events::ScoreMap;
use cinevibe_common::{AnalyticsEvent, VoteType};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{AdminUser, AuthUser, CriticUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{find_content, ReviewView};
use crate::services::{achievements, content_stats};
use crate::AppState;

/// XP for a viewer review
pub const VIEWER_REVIEW_XP: i64 = 5;
/// XP for a critic review
pub const PRO_REVIEW_XP: i64 = 15;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[serde(alias = "contentId")]
    pub content_id: i64,
    #[validate(length(min = 1, message = "Review text is required"))]
    pub content: String,
    pub aspects: Option<ScoreMap>,
    pub emotions: Option<ScoreMap>,
    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProReviewRequest {
    #[serde(alias = "contentId")]
    pub content_id: i64,
    #[serde(alias = "reviewText")]
    #[validate(length(min = 1, message = "Review text is required"))]
    pub review_text: String,
    pub aspects: ScoreMap,
    pub emotions: ScoreMap,
    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "Review text cannot be empty"))]
    pub content: Option<String>,
    pub aspects: Option<ScoreMap>,
    pub emotions: Option<ScoreMap>,
    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub r#type: String,
}

/// A review about to be stored
struct NewReview {
    content_id: i64,
    text: String,
    aspects: ScoreMap,
    emotions: ScoreMap,
    rating: Option<f64>,
    xp: i64,
}

/// Empty maps are stored as NULL
fn map_column(map: &ScoreMap) -> Option<String> {
    if map.is_empty() {
        None
    } else {
        Some(json!(map).to_string())
    }
}

async fn post_review(state: &AppState, user: &AuthUser, review: NewReview) -> ApiResult<Value> {
    let content = find_content(&state.db, review.content_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Content {} not found", review.content_id)))?;

    let review_id = sqlx::query(
        "INSERT INTO reviews (content_id, user_id, content, aspects, emotions, rating) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(review.content_id)
    .bind(user.id)
    .bind(&review.text)
    .bind(map_column(&review.aspects))
    .bind(map_column(&review.emotions))
    .bind(review.rating)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    content_stats::recalculate(&state.db, review.content_id).await?;

    sqlx::query(
        "UPDATE users SET total_reviews = total_reviews + 1, total_ratings = total_ratings + ? \
         WHERE id = ?",
    )
    .bind(review.rating.is_some() as i64)
    .bind(user.id)
    .execute(&state.db)
    .await?;

    let unlocked = achievements::on_review_posted(
        &state.db,
        &state.events,
        user.id,
        review.text.chars().count(),
        review.rating,
    )
    .await?;
    achievements::award_xp(&state.db, user.id, review.xp).await?;

    state.events.emit_lossy(AnalyticsEvent::ReviewCreated {
        user_id: user.id,
        content_id: review.content_id,
        content_type: content.content_type.clone(),
        rating: review.rating,
        emotions: review.emotions,
        aspects: review.aspects,
        source: "web".to_string(),
        event_time: Utc::now(),
    });
    info!(
        "{} reviewed content {} (review {}, {} achievement(s))",
        user.username,
        review.content_id,
        review_id,
        unlocked.len()
    );

    Ok(json!({
        "review_id": review_id,
        "status": "inserted",
        "newAchievements": unlocked,
    }))
}

/// POST /api/reviews
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateReviewRequest>,
) -> ApiResult<Json<Value>> {
    let review = NewReview {
        content_id: req.content_id,
        text: req.content,
        aspects: req.aspects.unwrap_or_default(),
        emotions: req.emotions.unwrap_or_default(),
        rating: req.rating,
        xp: VIEWER_REVIEW_XP,
    };
    Ok(Json(post_review(&state, &user, review).await?))
}

/// POST /api/reviews/pro
pub async fn create_pro_review(
    State(state): State<AppState>,
    CriticUser(user): CriticUser,
    ValidatedJson(req): ValidatedJson<ProReviewRequest>,
) -> ApiResult<Json<Value>> {
    let review = NewReview {
        content_id: req.content_id,
        text: req.review_text,
        aspects: req.aspects,
        emotions: req.emotions,
        rating: Some(req.rating),
        xp: PRO_REVIEW_XP,
    };
    Ok(Json(post_review(&state, &user, review).await?))
}

pub async fn load_review(state: &AppState, id: i64) -> ApiResult<ReviewView> {
    let row = sqlx::query("SELECT * FROM reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Review {} not found", id)))?;
    Ok(ReviewView::from_row(&row)?)
}

async fn content_type_of(state: &AppState, content_id: i64) -> ApiResult<String> {
    Ok(find_content(&state.db, content_id)
        .await?
        .map(|c| c.content_type)
        .unwrap_or_default())
}

/// PUT /api/reviews/:id (author or admin)
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateReviewRequest>,
) -> ApiResult<Json<ReviewView>> {
    let existing = load_review(&state, id).await?;
    if existing.user_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden("You can only edit your own reviews".to_string()));
    }

    let text = req.content.unwrap_or_else(|| existing.content.clone());
    let aspects = match &req.aspects {
        Some(map) => map_column(map),
        None => existing.aspects.as_ref().map(Value::to_string),
    };
    let emotions = match &req.emotions {
        Some(map) => map_column(map),
        None => existing.emotions.as_ref().map(Value::to_string),
    };
    let rating = req.rating.or(existing.rating);

    sqlx::query("UPDATE reviews SET content = ?, aspects = ?, emotions = ?, rating = ? WHERE id = ?")
        .bind(&text)
        .bind(aspects)
        .bind(emotions)
        .bind(rating)
        .bind(id)
        .execute(&state.db)
        .await?;

    let rated_delta = rating.is_some() as i64 - existing.rating.is_some() as i64;
    if rated_delta != 0 {
        sqlx::query("UPDATE users SET total_ratings = MAX(total_ratings + ?, 0) WHERE id = ?")
            .bind(rated_delta)
            .bind(existing.user_id)
            .execute(&state.db)
            .await?;
    }

    content_stats::recalculate(&state.db, existing.content_id).await?;

    let content_type = content_type_of(&state, existing.content_id).await?;
    let now = Utc::now();
    state.events.emit_lossy(AnalyticsEvent::ReviewUpdated {
        user_id: existing.user_id,
        content_id: existing.content_id,
        content_type: content_type.clone(),
        rating,
        source: "web".to_string(),
        event_time: now,
    });
    if rating != existing.rating {
        state.events.emit_lossy(AnalyticsEvent::RatingChanged {
            user_id: existing.user_id,
            content_id: existing.content_id,
            content_type,
            old_rating: existing.rating,
            new_rating: rating,
            event_time: now,
        });
    }

    Ok(Json(load_review(&state, id).await?))
}

/// DELETE /api/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let existing = load_review(&state, id).await?;
    remove_review(&state, &existing).await?;
    info!("{} deleted review {}", admin.username, id);
    Ok(Json(json!({ "status": "deleted" })))
}

/// Delete a review and bring aggregates and counters back in line
pub async fn remove_review(state: &AppState, review: &ReviewView) -> ApiResult<()> {
    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review.id)
        .execute(&state.db)
        .await?;

    sqlx::query(
        "UPDATE users SET total_reviews = MAX(total_reviews - 1, 0), \
         total_ratings = MAX(total_ratings - ?, 0) WHERE id = ?",
    )
    .bind(review.rating.is_some() as i64)
    .bind(review.user_id)
    .execute(&state.db)
    .await?;

    content_stats::recalculate(&state.db, review.content_id).await?;

    state.events.emit_lossy(AnalyticsEvent::ReviewDeleted {
        user_id: review.user_id,
        content_id: review.content_id,
        content_type: content_type_of(state, review.content_id).await?,
        event_time: Utc::now(),
    });
    Ok(())
}

const VOTE_COUNTS: &str = "(SELECT COUNT(*) FROM review_votes v WHERE v.review_id = r.id AND v.vote_type = 'LIKE') AS likes, \
    (SELECT COUNT(*) FROM review_votes v WHERE v.review_id = r.id AND v.vote_type = 'DISLIKE') AS dislikes";

async fn list_reviews(state: &AppState, filter: &str, id: i64) -> ApiResult<Vec<ReviewView>> {
    let sql = format!(
        "SELECT r.*, u.username, u.avatar_url, c.title AS content_title, {} \
         FROM reviews r \
         JOIN users u ON u.id = r.user_id \
         LEFT JOIN content c ON c.id = r.content_id \
         WHERE {} = ? ORDER BY r.id DESC",
        VOTE_COUNTS, filter
    );
    let rows = sqlx::query(&sql).bind(id).fetch_all(&state.db).await?;
    Ok(rows
        .iter()
        .map(ReviewView::from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// GET /api/reviews/content/:contentId
pub async fn reviews_for_content(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(list_reviews(&state, "r.content_id", content_id).await?))
}

/// GET /api/reviews/user/:userId
pub async fn reviews_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(list_reviews(&state, "r.user_id", user_id).await?))
}

/// GET /api/reviews/my
pub async fn my_reviews(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(list_reviews(&state, "r.user_id", user.id).await?))
}

/// Outcome of a vote toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Added,
    Updated,
    Removed,
}

impl VoteOutcome {
    /// Same vote twice removes it, a different vote replaces it
    pub fn decide(existing: Option<VoteType>, requested: VoteType) -> Self {
        match existing {
            None => VoteOutcome::Added,
            Some(prev) if prev == requested => VoteOutcome::Removed,
            Some(_) => VoteOutcome::Updated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Added => "added",
            VoteOutcome::Updated => "updated",
            VoteOutcome::Removed => "removed",
        }
    }
}

/// POST /api/reviews/:id/vote
pub async fn vote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(review_id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Json<Value>> {
    let vote_type: VoteType = req.r#type.parse()?;
    let review = load_review(&state, review_id).await?;

    let existing: Option<String> =
        sqlx::query_scalar("SELECT vote_type FROM review_votes WHERE user_id = ? AND review_id = ?")
            .bind(user.id)
            .bind(review_id)
            .fetch_optional(&state.db)
            .await?;
    let previous = existing.and_then(|v| v.parse::<VoteType>().ok());

    let outcome = VoteOutcome::decide(previous, vote_type);
    match outcome {
        VoteOutcome::Added => {
            sqlx::query("INSERT INTO review_votes (user_id, review_id, vote_type) VALUES (?, ?, ?)")
                .bind(user.id)
                .bind(review_id)
                .bind(vote_type.as_str())
                .execute(&state.db)
                .await?;
        }
        VoteOutcome::Updated => {
            sqlx::query("UPDATE review_votes SET vote_type = ? WHERE user_id = ? AND review_id = ?")
                .bind(vote_type.as_str())
                .bind(user.id)
                .bind(review_id)
                .execute(&state.db)
                .await?;
        }
        VoteOutcome::Removed => {
            sqlx::query("DELETE FROM review_votes WHERE user_id = ? AND review_id = ?")
                .bind(user.id)
                .bind(review_id)
                .execute(&state.db)
                .await?;
        }
    }

    if vote_type == VoteType::Like && outcome != VoteOutcome::Removed {
        if let Err(e) = achievements::on_like_received(&state.db, &state.events, review.user_id).await {
            warn!("Like achievements for user {} failed: {}", review.user_id, e);
        }
    }

    let body = match outcome {
        VoteOutcome::Removed => json!({ "status": outcome.as_str() }),
        _ => json!({ "status": outcome.as_str(), "vote": vote_type.as_str() }),
    };
    Ok(Json(body))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/pro", post(create_pro_review))
        .route("/my", get(my_reviews))
        .route("/content/:content_id", get(reviews_for_content))
        .route("/user/:user_id", get(reviews_by_user))
        .route("/:id", put(update_review).delete(delete_review))
        .route("/:id/vote", post(vote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_toggle() {
        assert_eq!(VoteOutcome::decide(None, VoteType::Like), VoteOutcome::Added);
        assert_eq!(
            VoteOutcome::decide(Some(VoteType::Like), VoteType::Like),
            VoteOutcome::Removed
        );
        assert_eq!(
            VoteOutcome::decide(Some(VoteType::Dislike), VoteType::Like),
            VoteOutcome::Updated
        );
    }

    #[test]
    fn test_empty_maps_are_stored_as_null() {
        assert_eq!(map_column(&ScoreMap::new()), None);
        let mut map = ScoreMap::new();
        map.insert("plot".into(), 8.0);
        assert_eq!(map_column(&map).as_deref(), Some(r#"{"plot":8.0}"#));
    }

    #[test]
    fn test_rating_range_is_validated() {
        let req = CreateReviewRequest {
            content_id: 1,
            content: "Great".into(),
            aspects: None,
            emotions: None,
            rating: Some(11.0),
        };
        assert!(req.validate().is_err());
    }
}
