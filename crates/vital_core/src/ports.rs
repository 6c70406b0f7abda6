//! crates/vital_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of Firebase Authentication and Firestore.

use async_trait::async_trait;
use serde_json::Map;

use crate::domain::{AuthUser, BreathingSession, Profile, SignInTokens};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., the
/// identity provider or the document store).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The document store behind the app: user records, intake profiles, and
/// breathing-session logs.
#[async_trait]
pub trait StoreService: Send + Sync {
    // --- User records ---
    async fn put_user_record(&self, uid: &str, email: &str) -> PortResult<()>;

    /// Idempotently marks the user's email as verified.
    async fn mark_user_verified(&self, uid: &str) -> PortResult<()>;

    // --- Profiles ---
    /// Stores the given document as the user's profile (one profile per user).
    async fn set_profile(&self, uid: &str, data: Map<String, serde_json::Value>)
        -> PortResult<()>;

    /// Applies a partial update to an existing profile.
    async fn update_profile(
        &self,
        uid: &str,
        data: Map<String, serde_json::Value>,
    ) -> PortResult<()>;

    async fn fetch_profile(&self, uid: &str) -> PortResult<Profile>;

    async fn fetch_all_profiles(&self) -> PortResult<Vec<Profile>>;

    // --- Breathing sessions ---
    /// Appends a session log, returning the new document id.
    async fn save_breathing_session(&self, session: &BreathingSession) -> PortResult<String>;

    /// All sessions for one user, ascending by timestamp.
    async fn sessions_for_user(&self, uid: &str) -> PortResult<Vec<BreathingSession>>;
}

/// The identity provider (Firebase Authentication).
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchanges email + password for ID/refresh tokens.
    /// Bad credentials surface as `PortError::Unauthorized`.
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> PortResult<SignInTokens>;

    /// Verifies an ID token and returns the uid it belongs to.
    async fn verify_id_token(&self, id_token: &str) -> PortResult<String>;

    /// Looks up a user record by uid (admin privilege).
    async fn get_user(&self, uid: &str) -> PortResult<AuthUser>;
}
