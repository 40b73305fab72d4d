//! Request correlation id and access logging

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request id carried through extensions for logging
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Echo a non-empty incoming `x-request-id` or generate one
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(REQUEST_ID_HEADER.clone(), value.clone());
    }
    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

/// Log every request on entry and completion
///
/// Runs inside the identity layer so the caller id is known.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let req_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "-".to_string());

    info!("→ {} {} user={} reqId={}", method, uri, user, req_id);
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed().as_millis();
    if status.is_server_error() {
        error!(
            "× {} {} {} {}ms user={} reqId={}",
            method, uri, status.as_u16(), elapsed, user, req_id
        );
    } else if status.is_client_error() {
        warn!(
            "× {} {} {} {}ms user={} reqId={}",
            method, uri, status.as_u16(), elapsed, user, req_id
        );
    } else {
        info!(
            "← {} {} {} {}ms user={} reqId={}",
            method, uri, status.as_u16(), elapsed, user, req_id
        );
    }

    response
}
