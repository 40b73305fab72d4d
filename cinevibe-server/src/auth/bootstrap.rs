//! First administrator account
//!
//! Roles cannot be escalated through the API without an existing admin, so
//! the server creates (or promotes) one from `ADMIN_USERNAME`,
//! `ADMIN_EMAIL` and `ADMIN_PASSWORD` at startup.

use sqlx::SqlitePool;
use tracing::info;

use super::hash_password;
use crate::error::ApiError;

/// Credentials for the bootstrap administrator
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl AdminSeed {
    /// Read from the environment; `None` unless all three are set
    pub fn from_env() -> Option<Self> {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            username: read("ADMIN_USERNAME")?,
            email: read("ADMIN_EMAIL")?,
            password: read("ADMIN_PASSWORD")?,
        })
    }
}

/// Create the admin, or promote and reactivate an existing account of that name
///
/// The password of an existing account is left untouched.
pub async fn ensure_admin(pool: &SqlitePool, seed: &AdminSeed) -> Result<i64, ApiError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(&seed.username)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        sqlx::query("UPDATE users SET role = 'ADMIN', is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        info!("Admin account '{}' ready (id {})", seed.username, id);
        return Ok(id);
    }

    let hash = hash_password(&seed.password)?;
    let id = sqlx::query(
        "INSERT INTO users (username, email, password, role, is_verified) VALUES (?, ?, ?, 'ADMIN', 1)",
    )
    .bind(&seed.username)
    .bind(&seed.email)
    .bind(&hash)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Created admin account '{}' (id {})", seed.username, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_ensure_admin_creates_then_promotes() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        cinevibe_common::db::prepare_schema(&pool).await.unwrap();

        let seed = AdminSeed {
            username: "root".into(),
            email: "root@cinevibe.local".into(),
            password: "changeme".into(),
        };
        let id = ensure_admin(&pool, &seed).await.unwrap();

        sqlx::query("UPDATE users SET role = 'USER', is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(ensure_admin(&pool, &seed).await.unwrap(), id);

        let (role, active): (String, i64) =
            sqlx::query_as("SELECT role, is_active FROM users WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(role, "ADMIN");
        assert_eq!(active, 1);
    }
}
