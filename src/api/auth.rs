use actix_web::{web, HttpResponse, ResponseError};

use crate::config::AuthSettings;
use crate::database::RecordStore;
use crate::models::{LoginRequest, RegisterRequest, Role};
use crate::services::auth_service::{self, LoginResponse};

async fn register_with_role(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    request: web::Json<RegisterRequest>,
    role: Role,
) -> HttpResponse {
    let email = request.user_email.clone().unwrap_or_else(|| "N/A".to_string());

    match auth_service::register(store.get_ref(), &settings, &request, role).await {
        Ok(response) => {
            log::info!("✅ Registration successful: {} ({})", email, role);
            HttpResponse::Created().json(response)
        }
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/postUser",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, token issued"),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn post_user(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    request: web::Json<RegisterRequest>,
) -> HttpResponse {
    log::info!("📝 POST /auth/postUser");
    register_with_role(store, settings, request, Role::Normal).await
}

#[utoipa::path(
    post,
    path = "/auth/postAdmin",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Admin registered as inactive, pending approval"),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn post_admin(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    request: web::Json<RegisterRequest>,
) -> HttpResponse {
    log::info!("📝 POST /auth/postAdmin");
    register_with_role(store, settings, request, Role::Admin).await
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Admin account not approved yet"),
        (status = 404, description = "No such user")
    )
)]
pub async fn login(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    let email = request.user_email.clone().unwrap_or_else(|| "N/A".to_string());
    log::info!("🔐 POST /auth/login - email: {}", email);

    match auth_service::login(store.get_ref(), &settings, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", email, e);
            e.error_response()
        }
    }
}
