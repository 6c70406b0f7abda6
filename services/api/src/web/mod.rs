//! services/api/src/web/mod.rs

pub mod admin;
pub mod middleware;
pub mod state;
pub mod user;

use utoipa::OpenApi;

pub use middleware::{require_admin, require_user, CurrentUser};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        user::register_handler,
        user::login_handler,
        user::songs_handler,
        admin::admin_login_handler,
        admin::generate_report_handler,
    ),
    components(
        schemas(
            user::RegisterRequest,
            user::LoginRequest,
            user::ValidateTokenRequest,
            admin::AdminLoginRequest,
        )
    ),
    tags(
        (name = "VitalChoice API", description = "Backend endpoints for the VitalChoice tobacco-cessation app.")
    )
)]
pub struct ApiDoc;
