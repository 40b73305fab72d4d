//! Row types read from SQLite and their JSON views
//!
//! Rows are decoded by hand with `try_get` so that JSON-valued TEXT columns
//! can be parsed and flags stored as INTEGER can become booleans.

use cinevibe_common::events::ScoreMap;
use cinevibe_common::{ContentType, UserLevel, UserRole};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Column list matching [`UserRecord::from_row`]
pub const USER_COLUMNS: &str = "id, username, email, password, role, level, registration_date, \
    last_login, avatar_url, bio, total_reviews, total_ratings, reputation, is_active, \
    is_verified, country, publication_id";

/// Column list matching [`ContentRecord::from_row`]
pub const CONTENT_COLUMNS: &str = "id, title, content_type, release_year, genre, description, \
    avg_rating, critics_rating, audience_rating, hype_index, reviews_count, positive_reviews, \
    mixed_reviews, negative_reviews, emotional_cloud, perception_map, poster_url, trailer_url, \
    director, cast_list, director_photo_url, cast_photos, runtime, developer, publisher, \
    platforms, esrb_rating, players, file_size, technical_info, created_at, updated_at";

/// Parse a JSON TEXT column; unreadable text yields `None`
pub fn parse_json(raw: Option<String>) -> Option<Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

/// Parse a `{"key": number}` TEXT column, skipping non-numeric entries
///
/// Numeric strings (`"7.5"`) are accepted as well.
pub fn parse_score_map(raw: Option<&str>) -> ScoreMap {
    let mut map = ScoreMap::new();
    let Some(Value::Object(obj)) = raw.and_then(|s| serde_json::from_str::<Value>(s).ok()) else {
        return map;
    };
    for (key, value) in obj {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(n) = number {
            map.insert(key, n);
        }
    }
    map
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub level: String,
    pub registration_date: Option<String>,
    pub last_login: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub total_reviews: i64,
    pub total_ratings: i64,
    pub reputation: i64,
    pub is_active: bool,
    pub is_verified: bool,
    pub country: Option<String>,
    pub publication_id: Option<i64>,
}

impl UserRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let is_active: i64 = row.try_get("is_active")?;
        let is_verified: i64 = row.try_get("is_verified")?;

        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password")?,
            role: role.parse().unwrap_or(UserRole::User),
            level: row.try_get("level")?,
            registration_date: row.try_get("registration_date")?,
            last_login: row.try_get("last_login")?,
            avatar_url: row.try_get("avatar_url")?,
            bio: row.try_get("bio")?,
            total_reviews: row.try_get("total_reviews")?,
            total_ratings: row.try_get("total_ratings")?,
            reputation: row.try_get("reputation")?,
            is_active: is_active != 0,
            is_verified: is_verified != 0,
            country: row.try_get("country")?,
            publication_id: row.try_get("publication_id")?,
        })
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            level: self.level.clone(),
            total_reviews: self.total_reviews,
            total_ratings: self.total_ratings,
            reputation: self.reputation,
            avatar_url: self.avatar_url.clone(),
            bio: self.bio.clone(),
            country: self.country.clone(),
            is_active: self.is_active,
            is_verified: self.is_verified,
            registration_date: self.registration_date.clone(),
            last_login: self.last_login.clone(),
        }
    }
}

/// Public view of a user (never includes the password hash)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub level: String,
    pub total_reviews: i64,
    pub total_ratings: i64,
    pub reputation: i64,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub registration_date: Option<String>,
    pub last_login: Option<String>,
}

pub async fn find_user(pool: &sqlx::SqlitePool, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(UserRecord::from_row).transpose()
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ContentRecord {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub avg_rating: f64,
    pub critics_rating: f64,
    pub audience_rating: f64,
    pub hype_index: i64,
    pub reviews_count: i64,
    pub positive_reviews: i64,
    pub mixed_reviews: i64,
    pub negative_reviews: i64,
    pub emotional_cloud: Option<Value>,
    pub perception_map: Option<Value>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub director: Option<String>,
    #[serde(rename = "cast")]
    pub cast_list: Option<String>,
    pub director_photo_url: Option<String>,
    pub cast_photos: Option<Value>,
    pub runtime: Option<i64>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub platforms: Option<Value>,
    pub esrb_rating: Option<String>,
    pub players: Option<String>,
    pub file_size: Option<String>,
    pub technical_info: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ContentRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content_type: row.try_get("content_type")?,
            release_year: row.try_get("release_year")?,
            genre: row.try_get("genre")?,
            description: row.try_get("description")?,
            avg_rating: row.try_get("avg_rating")?,
            critics_rating: row.try_get("critics_rating")?,
            audience_rating: row.try_get("audience_rating")?,
            hype_index: row.try_get("hype_index")?,
            reviews_count: row.try_get("reviews_count")?,
            positive_reviews: row.try_get("positive_reviews")?,
            mixed_reviews: row.try_get("mixed_reviews")?,
            negative_reviews: row.try_get("negative_reviews")?,
            emotional_cloud: parse_json(row.try_get("emotional_cloud")?),
            perception_map: parse_json(row.try_get("perception_map")?),
            poster_url: row.try_get("poster_url")?,
            trailer_url: row.try_get("trailer_url")?,
            director: row.try_get("director")?,
            cast_list: row.try_get("cast_list")?,
            director_photo_url: row.try_get("director_photo_url")?,
            cast_photos: parse_json(row.try_get("cast_photos")?),
            runtime: row.try_get("runtime")?,
            developer: row.try_get("developer")?,
            publisher: row.try_get("publisher")?,
            platforms: parse_json(row.try_get("platforms")?),
            esrb_rating: row.try_get("esrb_rating")?,
            players: row.try_get("players")?,
            file_size: row.try_get("file_size")?,
            technical_info: parse_json(row.try_get("technical_info")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Genres from the comma separated `genre` column
    pub fn genres(&self) -> Vec<String> {
        self.genre
            .as_deref()
            .map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub async fn find_content(
    pool: &sqlx::SqlitePool,
    id: i64,
) -> Result<Option<ContentRecord>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM content WHERE id = ?", CONTENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(ContentRecord::from_row).transpose()
}

/// Fields of a new content row (admin form or TMDB import)
#[derive(Debug, Clone)]
pub struct ContentDraft {
    pub title: String,
    pub content_type: ContentType,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub director: Option<String>,
    pub cast_list: Option<String>,
    pub director_photo_url: Option<String>,
    pub cast_photos: Option<Value>,
    pub runtime: Option<i64>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub platforms: Option<Value>,
    pub esrb_rating: Option<String>,
    pub players: Option<String>,
    pub file_size: Option<String>,
    pub technical_info: Option<Value>,
}

impl ContentDraft {
    pub fn new(title: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            title: title.into(),
            content_type,
            release_year: None,
            genre: None,
            description: None,
            poster_url: None,
            trailer_url: None,
            director: None,
            cast_list: None,
            director_photo_url: None,
            cast_photos: None,
            runtime: None,
            developer: None,
            publisher: None,
            platforms: None,
            esrb_rating: None,
            players: None,
            file_size: None,
            technical_info: None,
        }
    }
}

/// Insert a draft, returning the new id
pub async fn insert_content(pool: &sqlx::SqlitePool, draft: &ContentDraft) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO content (
            title, content_type, release_year, genre, description, poster_url, trailer_url,
            director, cast_list, director_photo_url, cast_photos, runtime, developer, publisher,
            platforms, esrb_rating, players, file_size, technical_info
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&draft.title)
    .bind(draft.content_type.as_str())
    .bind(draft.release_year)
    .bind(&draft.genre)
    .bind(&draft.description)
    .bind(&draft.poster_url)
    .bind(&draft.trailer_url)
    .bind(&draft.director)
    .bind(&draft.cast_list)
    .bind(&draft.director_photo_url)
    .bind(draft.cast_photos.as_ref().map(Value::to_string))
    .bind(draft.runtime)
    .bind(&draft.developer)
    .bind(&draft.publisher)
    .bind(draft.platforms.as_ref().map(Value::to_string))
    .bind(&draft.esrb_rating)
    .bind(&draft.players)
    .bind(&draft.file_size)
    .bind(draft.technical_info.as_ref().map(Value::to_string))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Compact content card used in joins (hero slides, watchlist, recommendations)
#[derive(Debug, Clone, Serialize)]
pub struct ContentSummary {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub poster_url: Option<String>,
    pub avg_rating: f64,
    pub reviews_count: i64,
    pub hype_index: i64,
}

impl ContentSummary {
    /// Decode from columns prefixed `c_` in a joined query
    pub fn from_prefixed_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("c_id")?,
            title: row.try_get("c_title")?,
            content_type: row.try_get("c_content_type")?,
            release_year: row.try_get("c_release_year")?,
            genre: row.try_get("c_genre")?,
            poster_url: row.try_get("c_poster_url")?,
            avg_rating: row.try_get("c_avg_rating")?,
            reviews_count: row.try_get("c_reviews_count")?,
            hype_index: row.try_get("c_hype_index")?,
        })
    }
}

/// Select list for [`ContentSummary::from_prefixed_row`], table alias `c`
pub const CONTENT_SUMMARY_COLUMNS: &str = "c.id AS c_id, c.title AS c_title, \
    c.content_type AS c_content_type, c.release_year AS c_release_year, c.genre AS c_genre, \
    c.poster_url AS c_poster_url, c.avg_rating AS c_avg_rating, \
    c.reviews_count AS c_reviews_count, c.hype_index AS c_hype_index";

// ============================================================================
// Reviews
// ============================================================================

/// Review row, optionally joined with author and vote counts
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub content_id: i64,
    pub user_id: i64,
    pub content: String,
    pub aspects: Option<Value>,
    pub emotions: Option<Value>,
    pub rating: Option<f64>,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dislikes: Option<i64>,
}

impl ReviewView {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            content_id: row.try_get("content_id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            aspects: parse_json(row.try_get("aspects")?),
            emotions: parse_json(row.try_get("emotions")?),
            rating: row.try_get("rating")?,
            created_at: row.try_get("created_at")?,
            username: row.try_get("username").ok().flatten(),
            avatar_url: row.try_get("avatar_url").ok().flatten(),
            content_title: row.try_get("content_title").ok().flatten(),
            likes: row.try_get("likes").ok(),
            dislikes: row.try_get("dislikes").ok(),
        })
    }
}

// ============================================================================
// Achievements, hero carousel, coming soon, publications
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_name: Option<String>,
    pub xp_reward: i64,
    pub category: String,
    pub created_at: Option<String>,
}

impl Achievement {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon_name: row.try_get("icon_name")?,
            xp_reward: row.try_get("xp_reward")?,
            category: row.try_get("category")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeroSlide {
    pub id: i64,
    pub content_id: i64,
    pub display_order: i64,
    pub is_active: bool,
    pub custom_title: Option<String>,
    pub custom_description: Option<String>,
    pub background_image: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub content: Option<ContentSummary>,
}

impl HeroSlide {
    /// Decode a hero row joined (LEFT JOIN) with [`CONTENT_SUMMARY_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let is_active: i64 = row.try_get("is_active")?;
        let joined: Option<i64> = row.try_get("c_id")?;
        let content = match joined {
            Some(_) => Some(ContentSummary::from_prefixed_row(row)?),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            content_id: row.try_get("content_id")?,
            display_order: row.try_get("display_order")?,
            is_active: is_active != 0,
            custom_title: row.try_get("custom_title")?,
            custom_description: row.try_get("custom_description")?,
            background_image: row.try_get("background_image")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            content,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComingSoonItem {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub release_date: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub is_active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ComingSoonItem {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let is_active: i64 = row.try_get("is_active")?;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content_type: row.try_get("content_type")?,
            release_date: row.try_get("release_date")?,
            description: row.try_get("description")?,
            poster_url: row.try_get("poster_url")?,
            trailer_url: row.try_get("trailer_url")?,
            is_active: is_active != 0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Publication {
    pub id: i64,
    pub name: String,
    pub logo_url: Option<String>,
    pub website: Option<String>,
    pub created_at: Option<String>,
}

impl Publication {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            logo_url: row.try_get("logo_url")?,
            website: row.try_get("website")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Reputation tier label for a stored level string
pub fn level_title(level: &str) -> &'static str {
    match level {
        "LEGEND" => UserLevel::Legend.title(),
        "EXPERT" => UserLevel::Expert.title(),
        "ENTHUSIAST" => UserLevel::Enthusiast.title(),
        _ => UserLevel::Novice.title(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_map_accepts_numbers_and_numeric_strings() {
        let map = parse_score_map(Some(r#"{"plot": 8, "acting": "7.5", "mood": "dark", "x": null}"#));
        assert_eq!(map.len(), 2);
        assert_eq!(map["plot"], 8.0);
        assert_eq!(map["acting"], 7.5);
    }

    #[test]
    fn test_parse_score_map_tolerates_garbage() {
        assert!(parse_score_map(None).is_empty());
        assert!(parse_score_map(Some("not json")).is_empty());
        assert!(parse_score_map(Some("[1,2]")).is_empty());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(7.456), 7.46);
        assert_eq!(round2(0.0), 0.0);
    }
}
