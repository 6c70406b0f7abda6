//! services/api/src/web/user.rs
//!
//! Axum handlers for the mobile-app endpoints: registration, login, profile
//! storage, breathing-session logs, and the mood music catalog.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use vital_core::domain::BreathingSession;
use vital_core::ports::PortError;

use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

type HandlerError = (StatusCode, Json<Value>);

fn server_error(message: &str) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": message })))
}

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub uid: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateTokenRequest {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveSessionRequest {
    pub duration: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
pub struct SongsQuery {
    pub mood: Option<String>,
}

//=========================================================================================
// Public Handlers
//=========================================================================================

/// Register a user record after Firebase Auth signup.
///
/// The uid must already exist in Firebase Auth; registration only mirrors it
/// into the `users` collection.
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User record created"),
        (status = 400, description = "Missing fields or unknown uid")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let (Some(uid), Some(email)) = (req.uid, req.email) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "UID and email are required" })),
        ));
    };

    // The account must already exist upstream.
    state.auth.get_user(&uid).await.map_err(|err| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
    })?;

    state.store.put_user_record(&uid, &email).await.map_err(|err| {
        error!(error = %err, "failed to write user record");
        (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User profile created successfully" })),
    ))
}

/// Log in with email and password.
///
/// Sign-in is delegated to Firebase; an unverified email is rejected with
/// 403 before any tokens are returned.
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, tokens returned"),
        (status = 401, description = "Bad credentials"),
        (status = 403, description = "Email not verified")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Email and password are required." })),
        ));
    };

    let login_failed =
        || (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Login failed" })));

    let tokens = state
        .auth
        .sign_in_with_password(&email, &password)
        .await
        .map_err(|err| {
            error!(error = %err, "password sign-in failed");
            login_failed()
        })?;

    let user = state.auth.get_user(&tokens.uid).await.map_err(|err| {
        error!(error = %err, "user lookup after sign-in failed");
        login_failed()
    })?;

    if !user.email_verified {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Please verify your email before logging in." })),
        ));
    }

    // Idempotent; a repeat login just rewrites the same flag.
    state
        .store
        .mark_user_verified(&tokens.uid)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to mark user verified");
            login_failed()
        })?;

    Ok(Json(json!({
        "message": "Login successful",
        "idToken": tokens.id_token,
        "refreshToken": tokens.refresh_token,
        "uid": tokens.uid,
    })))
}

/// Check whether an ID token is still valid. Always 200; the answer is in
/// the body.
pub async fn validate_token_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateTokenRequest>,
) -> Json<Value> {
    let Some(token) = req.token else {
        return Json(json!({ "valid": false }));
    };
    match state.auth.verify_id_token(&token).await {
        Ok(uid) => Json(json!({ "valid": true, "uid": uid })),
        Err(_) => Json(json!({ "valid": false })),
    }
}

/// List songs for a mood. Unknown or missing moods are an empty list.
#[utoipa::path(
    get,
    path = "/api/user/songs",
    params(("mood" = Option<String>, Query, description = "One of the app's mood names")),
    responses((status = 200, description = "Songs for the mood, possibly empty"))
)]
pub async fn songs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SongsQuery>,
) -> Json<Value> {
    let songs = query
        .mood
        .as_deref()
        .map(|mood| state.catalog.songs_for_mood(mood))
        .unwrap_or(&[]);
    Json(json!({ "songs": songs }))
}

//=========================================================================================
// Authenticated Handlers
//=========================================================================================

/// A "present" field in the loosely-typed profile body: non-empty string,
/// number, or true.
fn has_value(profile: &Map<String, Value>, key: &str) -> bool {
    match profile.get(key) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Store the caller's intake profile, keyed by uid (one profile per user).
pub async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(uid)): Extension<CurrentUser>,
    Json(profile): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, HandlerError> {
    if !has_value(&profile, "name") || !has_value(&profile, "phone") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing required fields" })),
        ));
    }

    state.store.set_profile(&uid, profile).await.map_err(|err| {
        error!(error = %err, "failed to save profile");
        server_error("Server error")
    })?;

    Ok(Json(json!({ "message": "Profile saved successfully" })))
}

/// Fetch the caller's profile document.
pub async fn fetch_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(uid)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.store.fetch_profile(&uid).await {
        Ok(profile) => Ok(Json(profile)),
        Err(PortError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Profile not found" })),
        )),
        Err(err) => {
            error!(error = %err, "failed to fetch profile");
            Err(server_error("Server error"))
        }
    }
}

/// Append one breathing-session log for the caller.
///
/// `duration` is required; a missing `timestamp` defaults to the current
/// time so ordering stays well defined.
pub async fn save_breathing_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(uid)): Extension<CurrentUser>,
    Json(req): Json<SaveSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let Some(duration) = req.duration else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields" })),
        ));
    };

    let session = BreathingSession {
        id: None,
        uid,
        duration: Some(duration),
        timestamp: Some(
            req.timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
    };

    state
        .store
        .save_breathing_session(&session)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to save breathing session");
            server_error("Failed to save breathing session")
        })?;

    Ok(Json(json!({ "message": "Breathing session saved successfully" })))
}

/// All of the caller's breathing sessions, ascending by timestamp.
pub async fn breathing_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(uid)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let sessions = state.store.sessions_for_user(&uid).await.map_err(|err| {
        error!(error = %err, "failed to list breathing sessions");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to retrieve breathing sessions" })),
        )
    })?;

    if sessions.is_empty() {
        return Ok(Json(json!({ "sessions": [] })));
    }
    Ok(Json(json!({ "count": sessions.len(), "sessions": sessions })))
}

/// The slice of the profile the app's local notification scheduler needs.
pub async fn profile_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(uid)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.store.fetch_profile(&uid).await {
        Ok(profile) => {
            let craving_times = profile
                .extra
                .get("cravingTimes")
                .cloned()
                .unwrap_or_else(|| json!({}));
            Ok(Json(json!({
                "name": profile.name,
                "quittingReason": profile.quitting_reason,
                "cravingTimings": profile.craving_timings,
                "cravingTimes": craving_times,
            })))
        }
        Err(PortError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Profile not found" })),
        )),
        Err(err) => {
            error!(error = %err, "failed to fetch profile for notifications");
            Err(server_error("Server error"))
        }
    }
}
