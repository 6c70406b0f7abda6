//! services/api/src/web/admin.rs
//!
//! Axum handlers for the doctor dashboard: admin login, profile management,
//! per-user session logs, and the PDF report endpoints.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{Duration, Utc};
use futures::StreamExt;
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use vital_core::domain::ReportOptions;
use vital_core::ports::PortError;

use crate::report;
use crate::web::state::AppState;

type HandlerError = (StatusCode, Json<Value>);

#[derive(Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    pub password: Option<String>,
}

#[derive(Serialize)]
struct AdminClaims {
    #[serde(rename = "isAdmin")]
    is_admin: bool,
    exp: i64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Exchange the doctor password for a short-lived admin JWT.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Access granted, JWT in body"),
        (status = 401, description = "Wrong password")
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if req.password.as_deref() != Some(state.config.doctor_password.as_str()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Wrong password" })),
        ));
    }

    let claims = AdminClaims {
        is_admin: true,
        exp: (Utc::now() + Duration::days(1)).timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .map_err(|err| {
        error!(error = %err, "failed to sign admin token");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to issue token" })),
        )
    })?;

    Ok(Json(json!({ "message": "Access granted", "token": token })))
}

/// All stored profiles, with uids from the document ids.
pub async fn list_profiles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let profiles = state.store.fetch_all_profiles().await.map_err(|err| {
        error!(error = %err, "failed to fetch profiles");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Failed to fetch profiles" })),
        )
    })?;
    Ok(Json(profiles))
}

/// One profile by uid.
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.store.fetch_profile(&uid).await {
        Ok(profile) => Ok(Json(profile)),
        Err(PortError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Profile not found" })),
        )),
        Err(err) => {
            error!(error = %err, "failed to fetch profile");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Server error" })),
            ))
        }
    }
}

/// Partial update of a profile; the stored document gains an updatedAt.
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, HandlerError> {
    state.store.update_profile(&uid, fields).await.map_err(|err| {
        error!(error = %err, uid, "profile update failed");
        (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
    })?;

    Ok(Json(json!({ "message": "Profile updated successfully", "uid": uid })))
}

/// Breathing sessions for any user, ascending by timestamp.
pub async fn breathing_sessions_by_uid_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let sessions = state.store.sessions_for_user(&uid).await.map_err(|err| {
        error!(error = %err, uid, "failed to list breathing sessions");
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

/// Generate the all-users PDF report. The document is fully buffered before
/// the first byte is sent.
#[utoipa::path(
    post,
    path = "/api/admin/generate-report",
    responses(
        (status = 200, description = "PDF report (application/pdf attachment)"),
        (status = 500, description = "Report generation failed")
    )
)]
pub async fn generate_report_handler(
    State(state): State<Arc<AppState>>,
    options: Option<Json<ReportOptions>>,
) -> Result<impl IntoResponse, HandlerError> {
    let options = options.map(|Json(o)| o).unwrap_or_default();

    let report_failed = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to generate PDF report" })),
        )
    };

    let profiles = state.store.fetch_all_profiles().await.map_err(|err| {
        error!(error = %err, "failed to fetch profiles for report");
        report_failed()
    })?;

    let pdf = report::render_batch(state.store.as_ref(), &profiles, options)
        .await
        .map_err(|err| {
            error!(error = %err, "batch report rendering failed");
            report_failed()
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=user-report.pdf".to_string(),
            ),
        ],
        pdf,
    ))
}

/// Generate a single user's PDF report, streamed while it is composed.
///
/// A missing profile is a clean 404; once streaming has begun, failures can
/// only truncate the body.
pub async fn generate_report_single_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    options: Option<Json<ReportOptions>>,
) -> Result<impl IntoResponse, HandlerError> {
    let options = options.map(|Json(o)| o).unwrap_or_default();

    let profile = match state.store.fetch_profile(&uid).await {
        Ok(profile) => profile,
        Err(PortError::NotFound(_)) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User profile not found" })),
            ));
        }
        Err(err) => {
            error!(error = %err, uid, "failed to fetch profile for report");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate PDF report" })),
            ));
        }
    };

    let chunks = report::render_single(state.store.clone(), profile, options);
    let body = Body::from_stream(chunks.map(Ok::<_, Infallible>));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"user-report-{}.pdf\"", uid),
            ),
        ],
        body,
    ))
}
