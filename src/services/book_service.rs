use mongodb::bson;

use crate::database::{self, RecordStore, StoreError, Table};
use crate::models::{Book, BookRequest, Role};
use crate::services::policy::{self, Actor, Operation};
use crate::utils::validation::{Mode, Validate};
use crate::utils::AppError;

pub async fn create_book(store: &dyn RecordStore, actor: &Actor, request: BookRequest) -> Result<Book, AppError> {
    policy::ensure(actor, Operation::ManageCatalog)?;
    request.validate(Mode::Create)?;
    policy::load_actor(store, actor).await?;

    let Some(book_name) = request.book_name else {
        return Err(AppError::validation("\"book_name\" is required"));
    };

    let now = chrono::Utc::now().timestamp();
    let book = Book {
        book_id: uuid::Uuid::new_v4().to_string(),
        book_name: book_name.trim().to_string(),
        book_description: request.book_description,
        book_price: request.book_price,
        book_cover: request.book_cover,
        book_link: request.book_link,
        created_at: now,
        updated_at: now,
    };

    database::save(store, Table::Books, &book).await?;
    log::info!("✅ Book {} created", book.book_id);
    Ok(book)
}

/// Normal users browse without a stored-account check; instructors must still be active.
async fn ensure_can_browse(store: &dyn RecordStore, actor: &Actor) -> Result<(), AppError> {
    policy::ensure(actor, Operation::BrowseCatalog)?;
    if actor.role != Role::Normal {
        policy::load_actor(store, actor).await?;
    }
    Ok(())
}

pub async fn list_books(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<Book>, AppError> {
    ensure_can_browse(store, actor).await?;
    Ok(database::fetch_all(store, Table::Books).await?)
}

pub async fn get_book(store: &dyn RecordStore, actor: &Actor, book_id: &str) -> Result<Book, AppError> {
    ensure_can_browse(store, actor).await?;
    database::fetch(store, Table::Books, book_id)
        .await?
        .ok_or_else(|| AppError::not_found("Book not found"))
}

pub async fn update_book(
    store: &dyn RecordStore,
    actor: &Actor,
    book_id: &str,
    request: BookRequest,
) -> Result<Book, AppError> {
    policy::ensure(actor, Operation::ManageCatalog)?;
    request.validate(Mode::PartialUpdate)?;
    policy::load_actor(store, actor).await?;

    let mut fields = bson::to_document(&request).map_err(StoreError::from)?;
    fields.insert("updated_at", chrono::Utc::now().timestamp());

    database::patch(store, Table::Books, book_id, fields)
        .await?
        .ok_or_else(|| AppError::not_found("Book not found"))
}

pub async fn delete_book(store: &dyn RecordStore, actor: &Actor, book_id: &str) -> Result<(), AppError> {
    policy::ensure(actor, Operation::ManageCatalog)?;
    policy::load_actor(store, actor).await?;

    if store.delete(Table::Books, book_id).await? {
        log::info!("🗑️  Book {} deleted", book_id);
        Ok(())
    } else {
        Err(AppError::not_found("Book not found"))
    }
}
