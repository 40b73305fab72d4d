//! Login, registration and token validation

use axum::{extract::State, routing::{get, post}, Json, Router};
use chrono::Utc;
use cinevibe_common::{AnalyticsEvent, UserRole};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthUser, ValidatedJson};
use crate::error::{ApiError, ApiResult};
use crate::models::{find_user, UserProfile, UserRecord, USER_COLUMNS};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username_or_email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Email must be valid"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Roles a user may pick at sign-up; ADMIN falls back to USER
fn self_assignable_role(requested: Option<&str>) -> UserRole {
    match requested.map(str::parse::<UserRole>) {
        Some(Ok(UserRole::Critic)) => UserRole::Critic,
        _ => UserRole::User,
    }
}

async fn find_by_login(pool: &SqlitePool, login: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ?1 OR email = ?1",
        USER_COLUMNS
    ))
    .bind(login)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(UserRecord::from_row).transpose()
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = find_by_login(&state.db, req.username_or_email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("Account is disabled".to_string()));
    }
    if !verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    sqlx::query("UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    let token = state.jwt.issue(user.id, &user.username, user.role)?;
    state.events.emit_lossy(AnalyticsEvent::UserLogin {
        user_id: user.id,
        event_time: Utc::now(),
    });
    info!("User {} logged in", user.username);

    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
        .bind(username)
        .bind(email)
        .fetch_one(&state.db)
        .await?;
    if taken > 0 {
        return Err(ApiError::Unauthorized("User already exists".to_string()));
    }

    let role = self_assignable_role(req.role.as_deref());
    let hash = hash_password(&req.password)?;

    let id = sqlx::query("INSERT INTO users (username, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(email)
        .bind(&hash)
        .bind(role.as_str())
        .execute(&state.db)
        .await?
        .last_insert_rowid();

    let user = find_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("User {} vanished after insert", id)))?;

    let token = state.jwt.issue(user.id, &user.username, user.role)?;
    state.events.emit_lossy(AnalyticsEvent::UserRegistered {
        user_id: user.id,
        username: user.username.clone(),
        event_time: Utc::now(),
    });
    info!("Registered user {} ({})", user.username, user.role);

    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

/// GET /api/auth/validate
pub async fn validate(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserProfile>> {
    let record = find_user(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
    Ok(Json(record.profile()))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/validate", get(validate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_not_self_assignable() {
        assert_eq!(self_assignable_role(Some("ADMIN")), UserRole::User);
        assert_eq!(self_assignable_role(Some("critic")), UserRole::Critic);
        assert_eq!(self_assignable_role(Some("wizard")), UserRole::User);
        assert_eq!(self_assignable_role(None), UserRole::User);
    }

    #[test]
    fn test_register_validation() {
        let req = RegisterRequest {
            username: "ann".into(),
            email: "not-an-email".into(),
            password: "123".into(),
            role: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
