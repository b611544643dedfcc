use axum::{extract::Request, http::HeaderName, middleware::Next, response::Response};
use uuid::Uuid;

use crate::error::AppError;

/// Set by the upstream gateway once the caller has been authenticated.
pub static USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

pub async fn require_user(mut req: Request, next: Next) -> Result<Response, AppError> {
    let id = req
        .headers()
        .get(&USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser { id });
    Ok(next.run(req).await)
}
