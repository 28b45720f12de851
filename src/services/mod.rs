pub mod auth_service;
pub mod book_service;
pub mod course_service;
pub mod policy;
pub mod resolver;
pub mod sync_service;
pub mod user_service;
