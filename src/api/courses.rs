use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

use super::with_warnings;
use crate::database::RecordStore;
use crate::models::{CreateCourseRequest, UpdateCourseRequest};
use crate::services::auth_service::Claims;
use crate::services::course_service;

pub async fn create_course(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    request: web::Json<CreateCourseRequest>,
) -> HttpResponse {
    log::info!("📚 Create course - user: {}", claims.user_id);

    match course_service::create_course(store.get_ref(), &claims.actor(), request.into_inner()).await {
        Ok(written) => {
            log::info!("✅ Course created: {}", written.course.course_id);
            HttpResponse::Created().json(with_warnings(
                json!({ "success": true, "course": written.course }),
                written.warnings,
            ))
        }
        Err(e) => {
            log::warn!("❌ Course creation failed: {}", e);
            e.error_response()
        }
    }
}

pub async fn list_courses(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("📚 List courses - user: {} ({})", claims.user_id, claims.user_role);

    match course_service::list_courses(store.get_ref(), &claims.actor()).await {
        Ok(courses) => HttpResponse::Ok().json(json!({
            "success": true,
            "count": courses.len(),
            "courses": courses
        })),
        Err(e) => {
            log::warn!("❌ Listing courses failed: {}", e);
            e.error_response()
        }
    }
}

/// Courses the caller instructs (all of them for a super).
pub async fn list_own_courses(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("📚 GET /admin/admincourses - user: {}", claims.user_id);

    match course_service::list_own_courses(store.get_ref(), &claims.actor()).await {
        Ok(courses) => HttpResponse::Ok().json(json!({
            "success": true,
            "count": courses.len(),
            "courses": courses
        })),
        Err(e) => {
            log::warn!("❌ Listing own courses failed: {}", e);
            e.error_response()
        }
    }
}

pub async fn get_course(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let course_id = path.into_inner();

    match course_service::get_course(store.get_ref(), &claims.actor(), &course_id).await {
        Ok(course) => HttpResponse::Ok().json(json!({ "success": true, "course": course })),
        Err(e) => {
            log::warn!("❌ Course {} not returned: {}", course_id, e);
            e.error_response()
        }
    }
}

pub async fn update_course(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateCourseRequest>,
) -> HttpResponse {
    let course_id = path.into_inner();
    log::info!("✏️  Update course {} - user: {}", course_id, claims.user_id);

    match course_service::update_course(store.get_ref(), &claims.actor(), &course_id, request.into_inner()).await {
        Ok(written) => HttpResponse::Ok().json(with_warnings(
            json!({ "success": true, "course": written.course }),
            written.warnings,
        )),
        Err(e) => {
            log::warn!("❌ Course {} update failed: {}", course_id, e);
            e.error_response()
        }
    }
}

pub async fn delete_course(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let course_id = path.into_inner();
    log::info!("🗑️  Delete course {} - user: {}", course_id, claims.user_id);

    match course_service::delete_course(store.get_ref(), &claims.actor(), &course_id).await {
        Ok(warnings) => HttpResponse::Ok().json(with_warnings(
            json!({ "success": true, "message": "Course deleted" }),
            warnings,
        )),
        Err(e) => {
            log::warn!("❌ Course {} deletion failed: {}", course_id, e);
            e.error_response()
        }
    }
}
