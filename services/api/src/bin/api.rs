//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        firebase_auth::FirebaseAuthAdapter, firestore::FirestoreAdapter,
        google_token::GoogleTokenSource,
    },
    config::Config,
    error::ApiError,
    music::MoodCatalog,
    web::{
        admin, middleware::require_admin, middleware::require_user, state::AppState, user, ApiDoc,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Firebase Adapters ---
    let http = reqwest::Client::new();
    let tokens: Arc<GoogleTokenSource> = Arc::new(GoogleTokenSource::from_config(&config)?);

    let auth_adapter = Arc::new(FirebaseAuthAdapter::new(
        http.clone(),
        config.firebase_api_key.clone(),
        tokens.clone(),
    ));
    let store_adapter = Arc::new(FirestoreAdapter::new(
        http,
        config.firebase_project_id.clone(),
        tokens,
    ));

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store: store_adapter,
        auth: auth_adapter,
        config: config.clone(),
        catalog: MoodCatalog::new(&config.base_url),
    });

    // The mobile app calls from an arbitrary origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let public_user_routes = Router::new()
        .route("/register", post(user::register_handler))
        .route("/login", post(user::login_handler))
        .route("/validate-token", post(user::validate_token_handler))
        .route("/songs", get(user::songs_handler));

    let protected_user_routes = Router::new()
        .route("/create-profile", post(user::create_profile_handler))
        .route("/profile", get(user::fetch_profile_handler))
        .route(
            "/save-breathing-session",
            post(user::save_breathing_session_handler),
        )
        .route("/breathing-sessions", get(user::breathing_sessions_handler))
        .route(
            "/profile-notifications",
            get(user::profile_notifications_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_user,
        ));

    let admin_routes = Router::new()
        .route("/profiles", get(admin::list_profiles_handler))
        .route(
            "/profiles/{uid}",
            get(admin::get_profile_handler).put(admin::update_profile_handler),
        )
        .route(
            "/breathing-sessions/{uid}",
            get(admin::breathing_sessions_by_uid_handler),
        )
        .route("/generate-report", post(admin::generate_report_handler))
        .route(
            "/generate-report-single/{uid}",
            post(admin::generate_report_single_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ))
        .route("/login", post(admin::admin_login_handler));

    let api_router = Router::new()
        .route("/", get(|| async { "VitalChoice is live" }))
        .nest("/api/user", public_user_routes.merge(protected_user_routes))
        .nest("/api/admin", admin_routes)
        .nest_service("/music", ServeDir::new(&config.music_dir))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
