//! Review-count progression: levels, milestones and the activity leaderboard
//!
//! Separate from reputation: here XP is simply ten points per review.

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};

pub const XP_PER_REVIEW: i64 = 10;

const LEVEL_TITLES: [&str; 10] = [
    "Novice",
    "Viewer",
    "Amateur",
    "Connoisseur",
    "Expert",
    "Master",
    "Guru",
    "Legend",
    "Titan",
    "Cinema Deity",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: i64,
    pub title: &'static str,
    pub xp: i64,
    #[serde(rename = "currentLevelXP")]
    pub current_level_xp: i64,
    #[serde(rename = "nextLevelXP")]
    pub next_level_xp: i64,
    pub progress: i64,
}

impl LevelInfo {
    pub fn for_reviews(review_count: i64) -> Self {
        let xp = review_count.max(0) * XP_PER_REVIEW;
        let level = ((xp as f64 / 100.0).sqrt()).floor() as i64 + 1;
        let current = (level - 1) * (level - 1) * 100;
        let next = level * level * 100;
        let title_index = (level - 1).clamp(0, LEVEL_TITLES.len() as i64 - 1) as usize;
        let progress = ((xp - current) * 100) / (next - current);

        Self {
            level,
            title: LEVEL_TITLES[title_index],
            xp,
            current_level_xp: current,
            next_level_xp: next,
            progress,
        }
    }
}

/// Counters the milestones are measured against
#[derive(Debug, Clone, Default)]
pub struct MilestoneStats {
    pub reviews: i64,
    pub genres: i64,
    pub content_types: i64,
    pub detailed_reviews: i64,
    pub follows: i64,
    pub active_days_last_week: i64,
    pub early_reviews: i64,
    pub hidden_gems: i64,
    /// `created_at` of the user's reviews, oldest first
    pub review_dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: &'static str,
    pub requirement: i64,
    pub progress: i64,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<String>,
}

#[derive(Clone, Copy)]
enum Stat {
    Reviews,
    Follows,
    Genres,
    ContentTypes,
    DetailedReviews,
    ActiveDays,
    EarlyReviews,
    HiddenGems,
}

struct MilestoneDef {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    icon: &'static str,
    category: &'static str,
    requirement: i64,
    stat: Stat,
}

const MILESTONES: [MilestoneDef; 16] = [
    MilestoneDef { id: "first_review", title: "First Review", description: "Write your first review", icon: "pen", category: "reviews", requirement: 1, stat: Stat::Reviews },
    MilestoneDef { id: "review_5", title: "Getting Started", description: "Write 5 reviews", icon: "edit", category: "reviews", requirement: 5, stat: Stat::Reviews },
    MilestoneDef { id: "review_10", title: "Regular Reviewer", description: "Write 10 reviews", icon: "book", category: "reviews", requirement: 10, stat: Stat::Reviews },
    MilestoneDef { id: "review_25", title: "Dedicated Critic", description: "Write 25 reviews", icon: "award", category: "reviews", requirement: 25, stat: Stat::Reviews },
    MilestoneDef { id: "review_50", title: "Review Veteran", description: "Write 50 reviews", icon: "medal", category: "reviews", requirement: 50, stat: Stat::Reviews },
    MilestoneDef { id: "review_100", title: "Centurion", description: "Write 100 reviews", icon: "crown", category: "reviews", requirement: 100, stat: Stat::Reviews },
    MilestoneDef { id: "first_follow", title: "First Follow", description: "Follow your first critic", icon: "user-plus", category: "critics", requirement: 1, stat: Stat::Follows },
    MilestoneDef { id: "follow_5", title: "Curator", description: "Follow 5 critics", icon: "users", category: "critics", requirement: 5, stat: Stat::Follows },
    MilestoneDef { id: "follow_10", title: "Critic Circle", description: "Follow 10 critics", icon: "network", category: "critics", requirement: 10, stat: Stat::Follows },
    MilestoneDef { id: "genre_3", title: "Explorer", description: "Review titles from 3 genres", icon: "compass", category: "diversity", requirement: 3, stat: Stat::Genres },
    MilestoneDef { id: "genre_5", title: "Genre Hopper", description: "Review titles from 5 genres", icon: "map", category: "diversity", requirement: 5, stat: Stat::Genres },
    MilestoneDef { id: "all_types", title: "Omnivore", description: "Review a movie, a series and a game", icon: "layers", category: "diversity", requirement: 3, stat: Stat::ContentTypes },
    MilestoneDef { id: "detailed_review", title: "Detail Oriented", description: "Write a review with aspects and emotions", icon: "sliders", category: "engagement", requirement: 1, stat: Stat::DetailedReviews },
    MilestoneDef { id: "weekly_active", title: "Weekly Regular", description: "Review on 7 different days in a week", icon: "calendar", category: "engagement", requirement: 7, stat: Stat::ActiveDays },
    MilestoneDef { id: "early_bird", title: "Early Bird", description: "Review a title within 7 days of its release here", icon: "sunrise", category: "special", requirement: 1, stat: Stat::EarlyReviews },
    MilestoneDef { id: "gem_finder", title: "Gem Finder", description: "Rate 3 little-known titles 8 or higher", icon: "gem", category: "special", requirement: 3, stat: Stat::HiddenGems },
];

impl MilestoneStats {
    fn value(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Reviews => self.reviews,
            Stat::Follows => self.follows,
            Stat::Genres => self.genres,
            Stat::ContentTypes => self.content_types,
            Stat::DetailedReviews => self.detailed_reviews,
            Stat::ActiveDays => self.active_days_last_week,
            Stat::EarlyReviews => self.early_reviews,
            Stat::HiddenGems => self.hidden_gems,
        }
    }
}

/// Evaluate all milestones against `stats`
pub fn milestones(stats: &MilestoneStats) -> Vec<Milestone> {
    MILESTONES
        .iter()
        .map(|def| {
            let value = stats.value(def.stat);
            let unlocked = value >= def.requirement;
            // Review milestones know the exact review that crossed the line
            let unlocked_at = match def.stat {
                Stat::Reviews if unlocked => stats
                    .review_dates
                    .get((def.requirement - 1) as usize)
                    .cloned(),
                _ => None,
            };
            Milestone {
                id: def.id,
                title: def.title,
                description: def.description,
                icon: def.icon,
                category: def.category,
                requirement: def.requirement,
                progress: value.min(def.requirement),
                unlocked,
                unlocked_at,
            }
        })
        .collect()
}

pub async fn load_stats(pool: &SqlitePool, user_id: i64) -> Result<MilestoneStats, sqlx::Error> {
    let review_dates: Vec<String> = sqlx::query_scalar(
        "SELECT created_at FROM reviews WHERE user_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(DISTINCT c.content_type) FROM reviews r JOIN content c ON c.id = r.content_id
                WHERE r.user_id = ?1) AS content_types,
            (SELECT COUNT(*) FROM reviews WHERE user_id = ?1
                AND aspects IS NOT NULL AND emotions IS NOT NULL) AS detailed_reviews,
            (SELECT COUNT(*) FROM user_critic_preferences WHERE user_id = ?1) AS follows,
            (SELECT COUNT(DISTINCT date(created_at)) FROM reviews WHERE user_id = ?1
                AND created_at >= datetime('now', '-7 days')) AS active_days,
            (SELECT COUNT(*) FROM reviews r JOIN content c ON c.id = r.content_id
                WHERE r.user_id = ?1 AND julianday(r.created_at) - julianday(c.created_at) <= 7) AS early_reviews,
            (SELECT COUNT(*) FROM reviews r JOIN content c ON c.id = r.content_id
                WHERE r.user_id = ?1 AND r.rating >= 8 AND c.reviews_count < 5) AS hidden_gems
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let genres = super::achievements::genres_reviewed(pool, user_id).await?;

    Ok(MilestoneStats {
        reviews: review_dates.len() as i64,
        genres: genres as i64,
        content_types: row.try_get("content_types")?,
        detailed_reviews: row.try_get("detailed_reviews")?,
        follows: row.try_get("follows")?,
        active_days_last_week: row.try_get("active_days")?,
        early_reviews: row.try_get("early_reviews")?,
        hidden_gems: row.try_get("hidden_gems")?,
        review_dates,
    })
}

pub async fn review_count(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Top reviewers among regular users and critics
pub async fn activity_leaderboard(pool: &SqlitePool) -> Result<Vec<Value>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, COUNT(r.id) AS review_count, AVG(r.rating) AS avg_rating
        FROM users u
        JOIN reviews r ON r.user_id = u.id
        WHERE u.role IN ('USER', 'CRITIC')
        GROUP BY u.id
        HAVING COUNT(r.id) > 0
        ORDER BY review_count DESC, avg_rating DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<Value, sqlx::Error> {
            let count: i64 = row.try_get("review_count")?;
            let avg: Option<f64> = row.try_get("avg_rating")?;
            Ok(json!({
                "rank": i + 1,
                "userId": row.try_get::<i64, _>("id")?,
                "username": row.try_get::<String, _>("username")?,
                "reviewCount": count,
                "avgRating": avg.map(|a| format!("{:.1}", a)).unwrap_or_else(|| "N/A".to_string()),
                "xp": count * XP_PER_REVIEW,
            }))
        })
        .collect()
}
