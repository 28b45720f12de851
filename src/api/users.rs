use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

use super::with_warnings;
use crate::config::AuthSettings;
use crate::database::RecordStore;
use crate::models::{EnrollmentRequest, UpdateStateRequest, UpdateUserRequest, UserResponse};
use crate::services::auth_service::Claims;
use crate::services::user_service::{self, Audience};

fn entity_key(audience: Audience) -> &'static str {
    match audience {
        Audience::Users => "user",
        Audience::Admins => "admin",
    }
}

async fn get_profile(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    user_id: String,
    audience: Audience,
) -> HttpResponse {
    match user_service::get_profile(store.get_ref(), &claims.actor(), audience, &user_id).await {
        Ok(user) => HttpResponse::Ok().json(json!({
            "success": true,
            entity_key(audience): UserResponse::from(user)
        })),
        Err(e) => {
            log::warn!("❌ Profile {} not returned: {}", user_id, e);
            e.error_response()
        }
    }
}

async fn update_profile(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    claims: web::ReqData<Claims>,
    user_id: String,
    request: UpdateUserRequest,
    audience: Audience,
) -> HttpResponse {
    log::info!("✏️  Update profile {} - by: {}", user_id, claims.user_id);

    match user_service::update_profile(store.get_ref(), &settings, &claims.actor(), audience, &user_id, request).await {
        Ok(written) => HttpResponse::Ok().json(with_warnings(
            json!({
                "success": true,
                entity_key(audience): UserResponse::from(written.user)
            }),
            written.warnings,
        )),
        Err(e) => {
            log::warn!("❌ Profile {} update failed: {}", user_id, e);
            e.error_response()
        }
    }
}

async fn delete_profile(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    user_id: String,
    audience: Audience,
) -> HttpResponse {
    log::info!("🗑️  Delete account {} - by: {}", user_id, claims.user_id);

    match user_service::delete_user(store.get_ref(), &claims.actor(), audience, &user_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "message": "Account deleted" })),
        Err(e) => {
            log::warn!("❌ Account {} deletion failed: {}", user_id, e);
            e.error_response()
        }
    }
}

async fn list_profiles(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    audience: Audience,
) -> HttpResponse {
    match user_service::list_users(store.get_ref(), &claims.actor(), audience).await {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            let key = match audience {
                Audience::Users => "users",
                Audience::Admins => "admins",
            };
            HttpResponse::Ok().json(json!({
                "success": true,
                "count": users.len(),
                key: users
            }))
        }
        Err(e) => {
            log::warn!("❌ Listing accounts failed: {}", e);
            e.error_response()
        }
    }
}

pub async fn get_user(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    get_profile(store, claims, path.into_inner(), Audience::Users).await
}

pub async fn get_admin(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    get_profile(store, claims, path.into_inner(), Audience::Admins).await
}

pub async fn update_user(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    update_profile(store, settings, claims, path.into_inner(), request.into_inner(), Audience::Users).await
}

pub async fn update_admin(
    store: web::Data<dyn RecordStore>,
    settings: web::Data<AuthSettings>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    update_profile(store, settings, claims, path.into_inner(), request.into_inner(), Audience::Admins).await
}

pub async fn delete_user(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    delete_profile(store, claims, path.into_inner(), Audience::Users).await
}

pub async fn delete_admin(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    delete_profile(store, claims, path.into_inner(), Audience::Admins).await
}

pub async fn list_users(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👥 GET /superadmin/users");
    list_profiles(store, claims, Audience::Users).await
}

pub async fn list_admins(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👥 GET /superadmin/admins");
    list_profiles(store, claims, Audience::Admins).await
}

#[utoipa::path(
    put,
    path = "/superadmin/approve/{user_id}",
    tag = "Super Admin",
    params(("user_id" = String, Path, description = "Admin to approve or suspend")),
    request_body = UpdateStateRequest,
    responses(
        (status = 200, description = "State changed and pushed to the admin's courses"),
        (status = 400, description = "Invalid state or target is not an admin"),
        (status = 403, description = "Super admin privileges required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_admin(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateStateRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("👑 PUT /superadmin/approve/{} - state: {:?}", user_id, request.user_state);

    match user_service::set_admin_state(store.get_ref(), &claims.actor(), &user_id, request.into_inner()).await {
        Ok(written) => HttpResponse::Ok().json(with_warnings(
            json!({
                "success": true,
                "admin": UserResponse::from(written.user)
            }),
            written.warnings,
        )),
        Err(e) => {
            log::warn!("❌ Approval of {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}

/// Replaces a normal user's enrolled books and courses.
pub async fn set_enrollment(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<EnrollmentRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📝 PUT /superadmin/userCourseAndBooks/{}", user_id);

    match user_service::set_enrollment(store.get_ref(), &claims.actor(), &user_id, request.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(json!({ "success": true, "user": UserResponse::from(user) })),
        Err(e) => {
            log::warn!("❌ Enrollment update for {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}

pub async fn enroll(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    request: web::Json<EnrollmentRequest>,
) -> HttpResponse {
    log::info!("📝 POST /user/enroll - user: {}", claims.user_id);

    match user_service::enroll(store.get_ref(), &claims.actor(), request.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(json!({ "success": true, "user": UserResponse::from(user) })),
        Err(e) => {
            log::warn!("❌ Enrollment for {} failed: {}", claims.user_id, e);
            e.error_response()
        }
    }
}

pub async fn enrolled_courses(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    match user_service::enrolled_courses(store.get_ref(), &claims.actor()).await {
        Ok(courses) => HttpResponse::Ok().json(json!({
            "success": true,
            "count": courses.len(),
            "courses": courses
        })),
        Err(e) => {
            log::warn!("❌ Enrolled courses for {} failed: {}", claims.user_id, e);
            e.error_response()
        }
    }
}

pub async fn enrolled_books(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    match user_service::enrolled_books(store.get_ref(), &claims.actor()).await {
        Ok(books) => HttpResponse::Ok().json(json!({
            "success": true,
            "count": books.len(),
            "books": books
        })),
        Err(e) => {
            log::warn!("❌ Enrolled books for {} failed: {}", claims.user_id, e);
            e.error_response()
        }
    }
}
