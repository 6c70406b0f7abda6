//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for the user-facing and admin route groups.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// The uid of the authenticated mobile user, inserted into request
/// extensions by [`require_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware for `/api/user` routes: validates the Firebase ID token from
/// the Authorization header and attaches the uid to the request.
///
/// A missing or malformed header is 401; a token Firebase rejects is 403.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&req).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Missing or invalid token" })),
        )
            .into_response()
    })?;

    let uid = state.auth.verify_id_token(token).await.map_err(|err| {
        debug!(error = %err, "ID token verification failed");
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response()
    })?;

    req.extensions_mut().insert(CurrentUser(uid));
    Ok(next.run(req).await)
}

#[derive(Debug, Deserialize)]
struct AdminClaims {
    #[serde(rename = "isAdmin", default)]
    is_admin: bool,
    #[allow(dead_code)]
    exp: usize,
}

/// Middleware for `/api/admin` routes: validates the doctor's HS256 JWT
/// issued by the admin login endpoint.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&req).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Missing or invalid token" })),
        )
            .into_response()
    })?;

    let decoded = jsonwebtoken::decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    );

    match decoded {
        Ok(data) if data.claims.is_admin => Ok(next.run(req).await),
        Ok(_) | Err(_) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response()),
    }
}
