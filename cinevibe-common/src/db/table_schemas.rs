//! Table schema declarations
//!
//! The column lists here are what every table must have after startup.
//! Adding a column to one of these lists is enough to roll it out: older
//! databases get it through [`sync_all_table_schemas`].

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

fn id() -> ColumnDefinition {
    ColumnDefinition::new("id", "INTEGER").primary_key()
}

fn created_at() -> ColumnDefinition {
    ColumnDefinition::new("created_at", "TIMESTAMP")
        .not_null()
        .default("CURRENT_TIMESTAMP")
}

fn updated_at() -> ColumnDefinition {
    ColumnDefinition::new("updated_at", "TIMESTAMP")
        .not_null()
        .default("CURRENT_TIMESTAMP")
}

fn fk(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, "INTEGER").not_null()
}

pub struct UsersTableSchema;

impl TableSchema for UsersTableSchema {
    fn table_name() -> &'static str {
        "users"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            ColumnDefinition::new("username", "TEXT").not_null().unique(),
            ColumnDefinition::new("email", "TEXT").not_null().unique(),
            ColumnDefinition::new("password", "TEXT").not_null(),
            ColumnDefinition::new("role", "TEXT").not_null().default("'USER'"),
            ColumnDefinition::new("level", "TEXT").not_null().default("'NOVICE'"),
            ColumnDefinition::new("registration_date", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
            ColumnDefinition::new("last_login", "TIMESTAMP"),
            ColumnDefinition::new("avatar_url", "TEXT"),
            ColumnDefinition::new("bio", "TEXT"),
            ColumnDefinition::new("total_reviews", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("total_ratings", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("reputation", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("is_active", "INTEGER").not_null().default("1"),
            ColumnDefinition::new("is_verified", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("country", "TEXT"),
            ColumnDefinition::new("publication_id", "INTEGER"),
        ]
    }
}

pub struct PublicationsTableSchema;

impl TableSchema for PublicationsTableSchema {
    fn table_name() -> &'static str {
        "publications"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            ColumnDefinition::new("name", "TEXT").not_null(),
            ColumnDefinition::new("logo_url", "TEXT"),
            ColumnDefinition::new("website", "TEXT"),
            created_at(),
        ]
    }
}

pub struct ContentTableSchema;

impl TableSchema for ContentTableSchema {
    fn table_name() -> &'static str {
        "content"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            ColumnDefinition::new("title", "TEXT").not_null(),
            ColumnDefinition::new("content_type", "TEXT").not_null(),
            ColumnDefinition::new("release_year", "INTEGER"),
            ColumnDefinition::new("genre", "TEXT"),
            ColumnDefinition::new("description", "TEXT"),
            ColumnDefinition::new("avg_rating", "REAL").not_null().default("0"),
            ColumnDefinition::new("critics_rating", "REAL").not_null().default("0"),
            ColumnDefinition::new("audience_rating", "REAL").not_null().default("0"),
            ColumnDefinition::new("hype_index", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("reviews_count", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("positive_reviews", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("mixed_reviews", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("negative_reviews", "INTEGER").not_null().default("0"),
            // JSON objects / arrays stored as TEXT
            ColumnDefinition::new("emotional_cloud", "TEXT"),
            ColumnDefinition::new("perception_map", "TEXT"),
            ColumnDefinition::new("poster_url", "TEXT"),
            ColumnDefinition::new("trailer_url", "TEXT"),
            ColumnDefinition::new("director", "TEXT"),
            ColumnDefinition::new("cast_list", "TEXT"),
            ColumnDefinition::new("director_photo_url", "TEXT"),
            ColumnDefinition::new("cast_photos", "TEXT"),
            ColumnDefinition::new("runtime", "INTEGER"),
            // Game specific
            ColumnDefinition::new("developer", "TEXT"),
            ColumnDefinition::new("publisher", "TEXT"),
            ColumnDefinition::new("platforms", "TEXT"),
            ColumnDefinition::new("esrb_rating", "TEXT"),
            ColumnDefinition::new("players", "TEXT"),
            ColumnDefinition::new("file_size", "TEXT"),
            ColumnDefinition::new("technical_info", "TEXT"),
            created_at(),
            updated_at(),
        ]
    }
}

pub struct ReviewsTableSchema;

impl TableSchema for ReviewsTableSchema {
    fn table_name() -> &'static str {
        "reviews"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("content_id"),
            fk("user_id"),
            ColumnDefinition::new("content", "TEXT").not_null(),
            ColumnDefinition::new("aspects", "TEXT"),
            ColumnDefinition::new("emotions", "TEXT"),
            ColumnDefinition::new("rating", "REAL"),
            created_at(),
        ]
    }
}

pub struct ReviewVotesTableSchema;

impl TableSchema for ReviewVotesTableSchema {
    fn table_name() -> &'static str {
        "review_votes"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("user_id"),
            fk("review_id"),
            ColumnDefinition::new("vote_type", "TEXT").not_null(),
            created_at(),
        ]
    }
}

pub struct AchievementsTableSchema;

impl TableSchema for AchievementsTableSchema {
    fn table_name() -> &'static str {
        "achievements"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            ColumnDefinition::new("name", "TEXT").not_null().unique(),
            ColumnDefinition::new("description", "TEXT"),
            ColumnDefinition::new("icon_name", "TEXT"),
            ColumnDefinition::new("xp_reward", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("category", "TEXT").not_null().default("'general'"),
            created_at(),
        ]
    }
}

pub struct UserAchievementsTableSchema;

impl TableSchema for UserAchievementsTableSchema {
    fn table_name() -> &'static str {
        "user_achievements"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("user_id"),
            fk("achievement_id"),
            ColumnDefinition::new("earned_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

pub struct RecommendationsTableSchema;

impl TableSchema for RecommendationsTableSchema {
    fn table_name() -> &'static str {
        "recommendations"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("user_id"),
            fk("content_id"),
            ColumnDefinition::new("score", "REAL").not_null().default("0"),
            ColumnDefinition::new("reason", "TEXT"),
            created_at(),
        ]
    }
}

pub struct ExpectationsTableSchema;

impl TableSchema for ExpectationsTableSchema {
    fn table_name() -> &'static str {
        "expectations"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("user_id"),
            fk("content_id"),
            ColumnDefinition::new("rating", "REAL").not_null(),
            created_at(),
        ]
    }
}

pub struct WatchlistTableSchema;

impl TableSchema for WatchlistTableSchema {
    fn table_name() -> &'static str {
        "watchlist"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![id(), fk("user_id"), fk("content_id"), created_at()]
    }
}

pub struct CriticPreferencesTableSchema;

impl TableSchema for CriticPreferencesTableSchema {
    fn table_name() -> &'static str {
        "user_critic_preferences"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![id(), fk("user_id"), fk("critic_id"), created_at()]
    }
}

pub struct HeroCarouselTableSchema;

impl TableSchema for HeroCarouselTableSchema {
    fn table_name() -> &'static str {
        "hero_carousel"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            fk("content_id"),
            ColumnDefinition::new("display_order", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("is_active", "INTEGER").not_null().default("1"),
            ColumnDefinition::new("custom_title", "TEXT"),
            ColumnDefinition::new("custom_description", "TEXT"),
            ColumnDefinition::new("background_image", "TEXT"),
            created_at(),
            updated_at(),
        ]
    }
}

pub struct ComingSoonTableSchema;

impl TableSchema for ComingSoonTableSchema {
    fn table_name() -> &'static str {
        "coming_soon_items"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            id(),
            ColumnDefinition::new("title", "TEXT").not_null(),
            ColumnDefinition::new("content_type", "TEXT").not_null().default("'MOVIE'"),
            ColumnDefinition::new("release_date", "TEXT"),
            ColumnDefinition::new("description", "TEXT"),
            ColumnDefinition::new("poster_url", "TEXT"),
            ColumnDefinition::new("trailer_url", "TEXT"),
            ColumnDefinition::new("is_active", "INTEGER").not_null().default("1"),
            created_at(),
            updated_at(),
        ]
    }
}

/// Add missing columns to every table
///
/// Runs after `CREATE TABLE IF NOT EXISTS` and before seeding.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<usize> {
    info!("=== Schema synchronization ===");

    let mut added = 0;
    added += SchemaSync::sync_table::<UsersTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<PublicationsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<ContentTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<ReviewsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<ReviewVotesTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<AchievementsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<UserAchievementsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<RecommendationsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<ExpectationsTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<WatchlistTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<CriticPreferencesTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<HeroCarouselTableSchema>(pool).await?;
    added += SchemaSync::sync_table::<ComingSoonTableSchema>(pool).await?;

    info!("=== Schema synchronization complete ({} column(s) added) ===", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
        sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{}') ORDER BY cid", table))
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_content_schema_has_aggregate_columns() {
        let columns = ContentTableSchema::expected_columns();
        for name in [
            "avg_rating",
            "critics_rating",
            "audience_rating",
            "hype_index",
            "emotional_cloud",
            "perception_map",
            "technical_info",
        ] {
            assert!(columns.iter().any(|c| c.name == name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_legacy_content_table_is_healed() {
        let pool = setup_test_db().await;

        // Early layout without critic split, hype or game columns
        sqlx::query(
            r#"
            CREATE TABLE content (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content_type TEXT NOT NULL,
                release_year INTEGER,
                genre TEXT,
                avg_rating REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO content (title, content_type) VALUES ('Heat', 'MOVIE')")
            .execute(&pool)
            .await
            .unwrap();

        let added = SchemaSync::sync_table::<ContentTableSchema>(&pool).await.unwrap();
        assert_eq!(added, ContentTableSchema::expected_columns().len() - 6);

        let names = column_names(&pool, "content").await;
        assert!(names.contains(&"hype_index".to_string()));
        assert!(names.contains(&"platforms".to_string()));

        let hype: i64 = sqlx::query_scalar("SELECT hype_index FROM content WHERE title = 'Heat'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(hype, 0);
    }

    #[tokio::test]
    async fn test_sync_all_skips_absent_tables() {
        let pool = setup_test_db().await;
        let added = sync_all_table_schemas(&pool).await.unwrap();
        assert_eq!(added, 0);
    }
}
