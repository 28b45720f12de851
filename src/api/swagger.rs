use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Course Market API",
        version = "1.0.0",
        description = "Course and book marketplace.\n\n**Authentication:** every route outside `/auth` and `/health` needs a JWT Bearer token.\n\n**Roles:** `normal` users browse and enroll, `admin` accounts author courses once approved, the `super` admin manages everything."
    ),
    paths(
        crate::api::auth::post_user,
        crate::api::auth::post_admin,
        crate::api::auth::login,

        crate::api::health::health_check,

        crate::api::users::approve_admin,
    ),
    components(
        schemas(
            crate::models::RegisterRequest,
            crate::models::LoginRequest,
            crate::models::Role,
            crate::models::UpdateStateRequest,
            crate::services::auth_service::LoginResponse,
            crate::services::auth_service::LoginUser,

            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration and login. Admin accounts start inactive until a super admin approves them."),
        (name = "Health", description = "Liveness check."),
        (name = "Super Admin", description = "Account administration reserved to the super admin."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
