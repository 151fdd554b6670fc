//! services/api/src/web/middleware.rs
//!
//! Caller identification middleware for routes that act on behalf of a user.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::warn;
use uuid::Uuid;

/// Name of the header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that reads the `x-user-id` header and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If missing or malformed, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    // 1. Extract the header
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse the user id
    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| {
        warn!("Rejected request with malformed {} header", USER_ID_HEADER);
        StatusCode::UNAUTHORIZED
    })?;

    // 3. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
