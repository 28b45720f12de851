use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

use crate::database::RecordStore;
use crate::models::BookRequest;
use crate::services::auth_service::Claims;
use crate::services::book_service;

pub async fn create_book(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    request: web::Json<BookRequest>,
) -> HttpResponse {
    log::info!("📖 POST /superadmin/books - user: {}", claims.user_id);

    match book_service::create_book(store.get_ref(), &claims.actor(), request.into_inner()).await {
        Ok(book) => HttpResponse::Created().json(json!({ "success": true, "book": book })),
        Err(e) => {
            log::warn!("❌ Book creation failed: {}", e);
            e.error_response()
        }
    }
}

pub async fn list_books(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    match book_service::list_books(store.get_ref(), &claims.actor()).await {
        Ok(books) => HttpResponse::Ok().json(json!({
            "success": true,
            "count": books.len(),
            "books": books
        })),
        Err(e) => {
            log::warn!("❌ Listing books failed: {}", e);
            e.error_response()
        }
    }
}

pub async fn get_book(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let book_id = path.into_inner();

    match book_service::get_book(store.get_ref(), &claims.actor(), &book_id).await {
        Ok(book) => HttpResponse::Ok().json(json!({ "success": true, "book": book })),
        Err(e) => {
            log::warn!("❌ Book {} not returned: {}", book_id, e);
            e.error_response()
        }
    }
}

pub async fn update_book(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<BookRequest>,
) -> HttpResponse {
    let book_id = path.into_inner();
    log::info!("✏️  PUT /superadmin/books/{}", book_id);

    match book_service::update_book(store.get_ref(), &claims.actor(), &book_id, request.into_inner()).await {
        Ok(book) => HttpResponse::Ok().json(json!({ "success": true, "book": book })),
        Err(e) => {
            log::warn!("❌ Book {} update failed: {}", book_id, e);
            e.error_response()
        }
    }
}

pub async fn delete_book(
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let book_id = path.into_inner();
    log::info!("🗑️  DELETE /superadmin/books/{}", book_id);

    match book_service::delete_book(store.get_ref(), &claims.actor(), &book_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "message": "Book deleted" })),
        Err(e) => {
            log::warn!("❌ Book {} deletion failed: {}", book_id, e);
            e.error_response()
        }
    }
}
