//! services/api/src/adapters/firebase_auth.rs
//!
//! This module contains the adapter for Firebase Authentication. It implements
//! the `AuthService` port from the `core` crate against the Identity Toolkit
//! REST API: password sign-in and ID-token verification use the public Web API
//! key; user lookup by uid is an admin call carrying the service-account
//! bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use vital_core::domain::{AuthUser, SignInTokens};
use vital_core::ports::{AuthService, PortError, PortResult};

use crate::adapters::google_token::TokenProvider;

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthService` port using the Identity
/// Toolkit REST API.
pub struct FirebaseAuthAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    tokens: Arc<dyn TokenProvider>,
}

impl FirebaseAuthAdapter {
    /// Creates a new `FirebaseAuthAdapter`.
    pub fn new(http: reqwest::Client, api_key: String, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            tokens,
        }
    }

    /// Points the adapter at an emulator or mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key)
    }
}

//=========================================================================================
// Identity Toolkit Wire Types
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Extracts the Identity Toolkit error message (e.g. INVALID_PASSWORD) from a
/// failed response body, falling back to the raw text.
async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text)
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for FirebaseAuthAdapter {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PortResult<SignInTokens> {
        let response = self
            .http
            .post(self.endpoint("signInWithPassword"))
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            // Wrong password, unknown user, disabled account: all credential
            // failures to the caller.
            let message = error_message(response).await;
            tracing::debug!("sign-in rejected: {}", message);
            return Err(PortError::Unauthorized);
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(SignInTokens {
            uid: body.local_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn verify_id_token(&self, id_token: &str) -> PortResult<String> {
        let response = self
            .http
            .post(self.endpoint("lookup"))
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unauthorized);
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        body.users
            .into_iter()
            .next()
            .map(|user| user.local_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn get_user(&self, uid: &str) -> PortResult<AuthUser> {
        let bearer = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(self.endpoint("lookup"))
            .bearer_auth(bearer)
            .json(&json!({ "localId": [uid] }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(PortError::Unexpected(format!(
                "user lookup failed: {}",
                message
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", uid)))?;
        Ok(AuthUser {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    struct StaticTokens;

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn bearer_token(&self) -> PortResult<String> {
            Ok("test-bearer".to_string())
        }
    }

    fn adapter(server: &MockServer) -> FirebaseAuthAdapter {
        FirebaseAuthAdapter::new(reqwest::Client::new(), "k".to_string(), Arc::new(StaticTokens))
            .with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn sign_in_parses_tokens() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/accounts:signInWithPassword")
                .query_param("key", "k");
            then.status(200).json_body(serde_json::json!({
                "localId": "uid-1",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
            }));
        });

        let tokens = adapter(&server)
            .sign_in_with_password("a@b.c", "pw")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(tokens.uid, "uid-1");
        assert_eq!(tokens.id_token, "id-token");
        assert_eq!(tokens.refresh_token, "refresh-token");
    }

    #[tokio::test]
    async fn bad_credentials_surface_as_unauthorized() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/accounts:signInWithPassword");
            then.status(400)
                .json_body(serde_json::json!({"error": {"message": "INVALID_PASSWORD"}}));
        });

        let err = adapter(&server)
            .sign_in_with_password("a@b.c", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unauthorized));
    }

    #[tokio::test]
    async fn verify_id_token_returns_uid() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/accounts:lookup");
            then.status(200).json_body(serde_json::json!({
                "users": [{"localId": "uid-9", "email": "a@b.c", "emailVerified": true}],
            }));
        });

        let uid = adapter(&server).verify_id_token("some-token").await.unwrap();
        assert_eq!(uid, "uid-9");
    }

    #[tokio::test]
    async fn get_user_sends_admin_bearer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/accounts:lookup")
                .header("authorization", "Bearer test-bearer");
            then.status(200).json_body(serde_json::json!({
                "users": [{"localId": "uid-3", "email": "a@b.c", "emailVerified": false}],
            }));
        });

        let user = adapter(&server).get_user("uid-3").await.unwrap();
        mock.assert();
        assert_eq!(user.uid, "uid-3");
        assert!(!user.email_verified);
    }
}
