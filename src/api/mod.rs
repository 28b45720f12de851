pub mod auth;
pub mod books;
pub mod courses;
pub mod health;
pub mod swagger;
pub mod users;

use actix_web::web;
use serde_json::Value;

use crate::middleware::AuthMiddleware;
use crate::models::Role;
use crate::utils::AppError;

/// Attaches fan-out failures to a success body, leaving it untouched when there are none.
pub(crate) fn with_warnings(mut body: Value, warnings: Vec<String>) -> Value {
    if !warnings.is_empty() {
        if let Some(object) = body.as_object_mut() {
            object.insert("warnings".to_string(), Value::from(warnings));
        }
    }
    body
}

/// Malformed JSON bodies come back as validation errors instead of actix's plain text.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, _req| AppError::validation(format!("Invalid JSON body: {}", err)).into())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/auth")
                .route("/postUser", web::post().to(auth::post_user))
                .route("/postAdmin", web::post().to(auth::post_admin))
                .route("/login", web::post().to(auth::login)),
        )
        // ==================== INSTRUCTORS (admin | super) ====================
        .service(
            web::scope("/admin")
                .wrap(AuthMiddleware::allow(Role::INSTRUCTORS))
                .route("/courses", web::post().to(courses::create_course))
                .route("/courses", web::get().to(courses::list_courses))
                .route("/admincourses", web::get().to(courses::list_own_courses))
                .route("/courses/{course_id}", web::get().to(courses::get_course))
                .route("/courses/{course_id}", web::put().to(courses::update_course))
                .route("/courses/{course_id}", web::delete().to(courses::delete_course))
                .route("/books", web::get().to(books::list_books))
                .route("/admins/{user_id}", web::get().to(users::get_admin))
                .route("/admins/{user_id}", web::put().to(users::update_admin)),
        )
        // ==================== SUPER ADMIN ====================
        .service(
            web::scope("/superadmin")
                .wrap(AuthMiddleware::allow(&[Role::Super]))
                .route("/approve/{user_id}", web::put().to(users::approve_admin))
                .route("/courses", web::post().to(courses::create_course))
                .route("/courses", web::get().to(courses::list_courses))
                .route("/courses/{course_id}", web::get().to(courses::get_course))
                .route("/books", web::post().to(books::create_book))
                .route("/books", web::get().to(books::list_books))
                .route("/books/{book_id}", web::get().to(books::get_book))
                .route("/books/{book_id}", web::put().to(books::update_book))
                .route("/books/{book_id}", web::delete().to(books::delete_book))
                .route("/users", web::get().to(users::list_users))
                .route("/admins", web::get().to(users::list_admins))
                .route("/users/{user_id}", web::get().to(users::get_user))
                .route("/users/{user_id}", web::put().to(users::update_user))
                .route("/users/{user_id}", web::delete().to(users::delete_user))
                .route("/admins/{user_id}", web::get().to(users::get_admin))
                .route("/admins/{user_id}", web::put().to(users::update_admin))
                .route("/admins/{user_id}", web::delete().to(users::delete_admin))
                .route("/userCourseAndBooks/{user_id}", web::put().to(users::set_enrollment)),
        )
        // ==================== NORMAL USERS ====================
        .service(
            web::scope("/user")
                .wrap(AuthMiddleware::allow(&[Role::Normal]))
                .route("/courses", web::get().to(courses::list_courses))
                .route("/courses/{course_id}", web::get().to(courses::get_course))
                .route("/books", web::get().to(books::list_books))
                .route("/books/{book_id}", web::get().to(books::get_book))
                .route("/usercourses", web::get().to(users::enrolled_courses))
                .route("/userbooks", web::get().to(users::enrolled_books))
                .route("/enroll", web::post().to(users::enroll))
                .route("/users/{user_id}", web::get().to(users::get_user))
                .route("/users/{user_id}", web::put().to(users::update_user)),
        );
}
