//! Achievement triggers, XP and the reputation-based level
//!
//! Each catalog achievement is tied to one [`Trigger`] and a threshold. When a
//! counter changes the caller reports the new value; every not-yet-earned
//! achievement whose predicate holds is awarded once.

use chrono::Utc;
use cinevibe_common::{AnalyticsEvent, EventBus, UserLevel};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::info;

use crate::models::Achievement;

/// Hype index from which a title counts as trending
pub const HYPE_THRESHOLD: i64 = 50;

/// Counter that can unlock achievements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    ReviewCount,
    ReviewLength,
    RatingValue,
    LikesCount,
    GenresCount,
    HypeReviews,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::ReviewCount => "review_count",
            Trigger::ReviewLength => "review_length",
            Trigger::RatingValue => "rating_value",
            Trigger::LikesCount => "likes_count",
            Trigger::GenresCount => "genres_count",
            Trigger::HypeReviews => "hype_reviews",
        }
    }
}

/// Whether the achievement called `name` is earned by `trigger` at `value`
pub fn qualifies(name: &str, trigger: Trigger, value: f64) -> bool {
    match (name, trigger) {
        ("First Step", Trigger::ReviewCount) => value >= 1.0,
        ("Movie Maniac", Trigger::ReviewCount) => value >= 10.0,
        ("Critic", Trigger::ReviewCount) => value >= 50.0,
        ("Popular", Trigger::LikesCount) => value >= 10.0,
        ("Life of the Party", Trigger::LikesCount) => value >= 5.0,
        ("Versatile", Trigger::GenresCount) => value >= 5.0,
        ("Trending", Trigger::HypeReviews) => value >= 3.0,
        ("Wordsmith", Trigger::ReviewLength) => value >= 500.0,
        ("Perfectionist", Trigger::RatingValue) => value == 10.0,
        ("Harsh Judge", Trigger::RatingValue) => value > 0.0 && value <= 2.0,
        _ => false,
    }
}

/// Numeric tier (1..=4) shown on profile cards
pub fn level_number(level: UserLevel) -> i64 {
    match level {
        UserLevel::Novice => 1,
        UserLevel::Enthusiast => 2,
        UserLevel::Expert => 3,
        UserLevel::Legend => 4,
    }
}

/// Add reputation and recompute the stored level
pub async fn award_xp(pool: &SqlitePool, user_id: i64, amount: i64) -> Result<(), sqlx::Error> {
    let reputation: Option<i64> =
        sqlx::query_scalar("UPDATE users SET reputation = reputation + ? WHERE id = ? RETURNING reputation")
            .bind(amount)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    if let Some(reputation) = reputation {
        let level = UserLevel::for_reputation(reputation);
        sqlx::query("UPDATE users SET level = ? WHERE id = ?")
            .bind(level.as_str())
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Award every achievement that `trigger` reaching `value` unlocks
///
/// Returns the achievements earned by this call.
pub async fn check_and_award(
    pool: &SqlitePool,
    events: &EventBus,
    user_id: i64,
    trigger: Trigger,
    value: f64,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let catalog: Vec<Achievement> = sqlx::query(
        "SELECT id, name, description, icon_name, xp_reward, category, created_at FROM achievements",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(Achievement::from_row)
    .collect::<Result<_, _>>()?;

    let earned: HashSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT achievement_id FROM user_achievements WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect();

    let mut unlocked = Vec::new();
    for achievement in catalog {
        if earned.contains(&achievement.id) || !qualifies(&achievement.name, trigger, value) {
            continue;
        }

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(achievement.id)
        .execute(pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            continue;
        }

        award_xp(pool, user_id, achievement.xp_reward).await?;
        events.emit_lossy(AnalyticsEvent::AchievementUnlocked {
            user_id,
            achievement: achievement.name.clone(),
            event_time: Utc::now(),
        });
        info!(
            "User {} unlocked '{}' ({} = {})",
            user_id,
            achievement.name,
            trigger.as_str(),
            value
        );
        unlocked.push(achievement);
    }

    Ok(unlocked)
}

/// Distinct genres across all titles the user reviewed
pub async fn genres_reviewed(pool: &SqlitePool, user_id: i64) -> Result<usize, sqlx::Error> {
    let genres: Vec<Option<String>> = sqlx::query_scalar(
        "SELECT DISTINCT c.genre FROM reviews r JOIN content c ON c.id = r.content_id WHERE r.user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let set: HashSet<String> = genres
        .iter()
        .flatten()
        .flat_map(|g| g.split(','))
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();
    Ok(set.len())
}

/// Run every review-related trigger after a review was posted
pub async fn on_review_posted(
    pool: &SqlitePool,
    events: &EventBus,
    user_id: i64,
    text_len: usize,
    rating: Option<f64>,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let review_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let hype_reviews: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reviews r JOIN content c ON c.id = r.content_id \
         WHERE r.user_id = ? AND c.hype_index >= ?",
    )
    .bind(user_id)
    .bind(HYPE_THRESHOLD)
    .fetch_one(pool)
    .await?;

    let genres = genres_reviewed(pool, user_id).await?;

    let mut unlocked = Vec::new();
    unlocked.extend(check_and_award(pool, events, user_id, Trigger::ReviewCount, review_count as f64).await?);
    unlocked.extend(check_and_award(pool, events, user_id, Trigger::ReviewLength, text_len as f64).await?);
    if let Some(rating) = rating {
        unlocked.extend(check_and_award(pool, events, user_id, Trigger::RatingValue, rating).await?);
    }
    unlocked.extend(check_and_award(pool, events, user_id, Trigger::GenresCount, genres as f64).await?);
    unlocked.extend(check_and_award(pool, events, user_id, Trigger::HypeReviews, hype_reviews as f64).await?);

    Ok(unlocked)
}

/// Check like thresholds for the author of a review that was just liked
pub async fn on_like_received(
    pool: &SqlitePool,
    events: &EventBus,
    author_id: i64,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let likes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM review_votes v JOIN reviews r ON r.id = v.review_id \
         WHERE r.user_id = ? AND v.vote_type = 'LIKE'",
    )
    .bind(author_id)
    .fetch_one(pool)
    .await?;

    check_and_award(pool, events, author_id, Trigger::LikesCount, likes as f64).await
}

/// Achievement card in the gamification views
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementCard {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: String,
    pub xp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<String>,
    pub progress: i64,
    pub requirement: i64,
}

/// Full catalog with the user's unlock state
pub async fn achievements_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<AchievementCard>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.name, a.description, a.icon_name, a.xp_reward, a.category, ua.earned_at
        FROM achievements a
        LEFT JOIN user_achievements ua ON ua.achievement_id = a.id AND ua.user_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<AchievementCard, sqlx::Error> {
            let earned_at: Option<String> = row.try_get("earned_at")?;
            Ok(AchievementCard {
                id: row.try_get("id")?,
                title: row.try_get("name")?,
                description: row.try_get("description")?,
                icon: row.try_get("icon_name")?,
                category: row.try_get("category")?,
                xp: row.try_get("xp_reward")?,
                progress: if earned_at.is_some() { 100 } else { 0 },
                unlocked_at: earned_at,
                requirement: 100,
            })
        })
        .collect()
}

/// Users ranked by reputation
pub async fn reputation_leaderboard(pool: &SqlitePool, limit: i64) -> Result<Vec<Value>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.reputation,
               COUNT(r.id) AS review_count,
               CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS avg_rating
        FROM users u
        LEFT JOIN reviews r ON r.user_id = u.id
        WHERE u.is_active = 1 AND u.role IN ('USER', 'CRITIC')
        GROUP BY u.id
        ORDER BY u.reputation DESC, u.id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<Value, sqlx::Error> {
            let avg: f64 = row.try_get("avg_rating")?;
            Ok(json!({
                "userId": row.try_get::<i64, _>("id")?,
                "username": row.try_get::<String, _>("username")?,
                "rank": i + 1,
                "xp": row.try_get::<i64, _>("reputation")?,
                "reviewCount": row.try_get::<i64, _>("review_count")?,
                "avgRating": crate::models::round2(avg),
            }))
        })
        .collect()
}

/// `{level, title, currentXP, nextLevelXP}` for a user, `None` if unknown
pub async fn level_view(pool: &SqlitePool, user_id: i64) -> Result<Option<Value>, sqlx::Error> {
    let reputation: Option<i64> = sqlx::query_scalar("SELECT reputation FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(reputation.map(|xp| {
        let level = UserLevel::for_reputation(xp);
        json!({
            "level": level_number(level),
            "title": level.title(),
            "currentXP": xp,
            "nextLevelXP": level.next_threshold(),
        })
    }))
}
