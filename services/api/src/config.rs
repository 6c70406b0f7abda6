//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Firebase project id; part of every Firestore document path.
    pub firebase_project_id: String,
    /// The public Web API key used for Identity Toolkit REST calls.
    pub firebase_api_key: String,
    /// Service-account credentials: a path to the JSON key file, or the JSON
    /// itself inline via FIREBASE_SERVICE_ACCOUNT (production deployments).
    pub service_account_path: Option<PathBuf>,
    pub service_account_json: Option<String>,
    /// The single admin/doctor password.
    pub doctor_password: String,
    /// Secret for signing the doctor's JWT.
    pub jwt_secret: String,
    /// Public base URL, used to build music asset links.
    pub base_url: String,
    /// Directory served under /music.
    pub music_dir: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Firebase Settings ---
        let firebase_project_id = std::env::var("FIREBASE_PROJECT_ID")
            .map_err(|_| ConfigError::MissingVar("FIREBASE_PROJECT_ID".to_string()))?;
        let firebase_api_key = std::env::var("FIREBASE_API_KEY")
            .map_err(|_| ConfigError::MissingVar("FIREBASE_API_KEY".to_string()))?;

        let service_account_path = std::env::var("FIREBASE_SERVICE_ACCOUNT_PATH")
            .map(PathBuf::from)
            .ok();
        let service_account_json = std::env::var("FIREBASE_SERVICE_ACCOUNT").ok();
        if service_account_path.is_none() && service_account_json.is_none() {
            return Err(ConfigError::MissingVar(
                "FIREBASE_SERVICE_ACCOUNT_PATH or FIREBASE_SERVICE_ACCOUNT".to_string(),
            ));
        }

        // --- Load Admin Settings ---
        let doctor_password = std::env::var("DOCTOR_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("DOCTOR_PASSWORD".to_string()))?;
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        // --- Load Music Catalog Settings ---
        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_address_str));
        let music_dir = std::env::var("MUSIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./music"));

        Ok(Self {
            bind_address,
            log_level,
            firebase_project_id,
            firebase_api_key,
            service_account_path,
            service_account_json,
            doctor_password,
            jwt_secret,
            base_url,
            music_dir,
        })
    }
}
