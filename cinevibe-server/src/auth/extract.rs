//! Request identity: bearer decoding middleware and extractors
//!
//! [`identity_middleware`] runs on every route. A valid bearer token puts an
//! [`AuthUser`] into the request extensions; no header leaves the request
//! anonymous; a malformed or expired token is rejected with 401.
//!
//! Handlers then pick the guard they need:
//! - `AuthUser`: any signed-in user
//! - `Option<AuthUser>`: anonymous allowed
//! - `AdminUser` / `CriticUser`: role checked, 403 otherwise

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use cinevibe_common::UserRole;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller, decoded from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Caller with the ADMIN role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Caller with the CRITIC role (admins pass as well)
#[derive(Debug, Clone)]
pub struct CriticUser(pub AuthUser);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Decode an optional bearer token into an [`AuthUser`] extension
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = bearer_token(request.headers()) {
        let claims = state.jwt.verify(token)?;
        request.extensions_mut().insert(AuthUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        });
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(ApiError::Forbidden("Insufficient permissions".to_string()));
        }
        Ok(AdminUser(user))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CriticUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        match user.role {
            UserRole::Critic | UserRole::Admin => Ok(CriticUser(user)),
            UserRole::User => Err(ApiError::Forbidden("Insufficient permissions".to_string())),
        }
    }
}

/// JSON body that is validated before the handler runs
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
