//! Database initialization tests
//!
//! Covers first-run creation, reopening an existing file, achievement seeding
//! and healing a database created by an older build.

use cinevibe_common::db::init::init_database;
use cinevibe_common::db::seed::ACHIEVEMENT_CATALOG;
use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    "users",
    "publications",
    "content",
    "reviews",
    "review_votes",
    "achievements",
    "user_achievements",
    "recommendations",
    "expectations",
    "watchlist",
    "user_critic_preferences",
    "hero_carousel",
    "coming_soon_items",
];

async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
    sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{}')", table))
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("cinevibe.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("cinevibe.db")).await.unwrap();

    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cinevibe.db");

    let pool1 = init_database(&db_path).await.unwrap();
    let columns_before = column_names(&pool1, "content").await;
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let columns_after = column_names(&pool2, "content").await;
    assert_eq!(columns_before, columns_after);

    let achievements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM achievements")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(achievements as usize, ACHIEVEMENT_CATALOG.len());
}

#[tokio::test]
async fn test_achievement_seed_restores_catalog_values() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cinevibe.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE achievements SET xp_reward = 999, icon_name = 'x' WHERE name = 'First Step'")
        .execute(&pool)
        .await
        .unwrap();
    let id_before: i64 = sqlx::query_scalar("SELECT id FROM achievements WHERE name = 'First Step'")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let (id, xp, icon): (i64, i64, String) = sqlx::query_as(
        "SELECT id, xp_reward, icon_name FROM achievements WHERE name = 'First Step'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(id, id_before);
    assert_eq!(xp, 10);
    assert_eq!(icon, "footprints");
}

#[tokio::test]
async fn test_legacy_users_table_gains_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("legacy.db");

    // Layout from before reputation and profile fields existed
    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'USER'
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO users (username, email, password) VALUES ('old', 'old@x.io', 'h')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let columns = column_names(&pool, "users").await;
    for expected in ["level", "reputation", "country", "is_active", "registration_date"] {
        assert!(columns.contains(&expected.to_string()), "missing {}", expected);
    }

    let (level, reputation, active, registered): (String, i64, i64, Option<String>) = sqlx::query_as(
        "SELECT level, reputation, is_active, registration_date FROM users WHERE username = 'old'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(level, "NOVICE");
    assert_eq!(reputation, 0);
    assert_eq!(active, 1);
    assert!(registered.is_some(), "registration_date should be backfilled");
}
