//! Reference resolution for cross-entity IDs.
//!
//! `resolve_*` is all-or-nothing: every ID is fetched concurrently, and if any of
//! them is missing (or rejected by the acceptance rule) the whole call fails with
//! every offending ID listed. `hydrate_*` is the read-side variant that skips
//! dangling IDs instead.

use futures::future::join_all;
use serde::de::DeserializeOwned;

use crate::database::{self, RecordStore, Table};
use crate::models::{Book, Course, Role, User};
use crate::utils::AppError;

/// Trims, drops empty entries and removes duplicates, keeping first occurrences.
pub fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !normalized.iter().any(|seen| seen == id) {
            normalized.push(id.to_string());
        }
    }
    normalized
}

async fn fetch_each<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    ids: &[String],
) -> Result<Vec<Option<T>>, AppError> {
    let lookups = ids.iter().map(|id| database::fetch::<T>(store, table, id));
    join_all(lookups)
        .await
        .into_iter()
        .map(|result| result.map_err(AppError::from))
        .collect()
}

async fn resolve<T, F>(
    store: &dyn RecordStore,
    table: Table,
    ids: Vec<String>,
    label: &str,
    accept: F,
) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    let ids = normalize_ids(ids);
    let found = fetch_each::<T>(store, table, &ids).await?;

    let mut resolved = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for (id, entity) in ids.into_iter().zip(found) {
        match entity {
            Some(entity) if accept(&entity) => resolved.push(entity),
            _ => missing.push(id),
        }
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        log::warn!("⚠️  Unresolved {} references: {:?}", label, missing);
        Err(AppError::Reference {
            message: format!("Invalid {} reference(s): {}", label, missing.join(", ")),
            missing,
        })
    }
}

/// Resolves user IDs; with `required_roles`, a user outside the set counts as missing.
pub async fn resolve_users(
    store: &dyn RecordStore,
    ids: Vec<String>,
    required_roles: Option<&[Role]>,
) -> Result<Vec<User>, AppError> {
    resolve(store, Table::Users, ids, "user", |user: &User| {
        required_roles.map_or(true, |roles| roles.contains(&user.user_role))
    })
    .await
}

pub async fn resolve_instructors(store: &dyn RecordStore, ids: Vec<String>) -> Result<Vec<User>, AppError> {
    resolve_users(store, ids, Some(Role::INSTRUCTORS)).await
}

pub async fn resolve_courses(
    store: &dyn RecordStore,
    ids: Vec<String>,
    published_only: bool,
) -> Result<Vec<Course>, AppError> {
    resolve(store, Table::Courses, ids, "course", |course: &Course| {
        !published_only || course.course_published
    })
    .await
}

pub async fn resolve_books(store: &dyn RecordStore, ids: Vec<String>) -> Result<Vec<Book>, AppError> {
    resolve(store, Table::Books, ids, "book", |_: &Book| true).await
}

async fn hydrate<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    ids: &[String],
) -> Result<Vec<T>, AppError> {
    let found = fetch_each::<T>(store, table, ids).await?;
    Ok(ids
        .iter()
        .zip(found)
        .filter_map(|(id, entity)| {
            if entity.is_none() {
                log::warn!("⚠️  Skipping dangling {} reference: {}", table.name(), id);
            }
            entity
        })
        .collect())
}

pub async fn hydrate_courses(store: &dyn RecordStore, ids: &[String]) -> Result<Vec<Course>, AppError> {
    hydrate(store, Table::Courses, ids).await
}

pub async fn hydrate_books(store: &dyn RecordStore, ids: &[String]) -> Result<Vec<Book>, AppError> {
    hydrate(store, Table::Books, ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    async fn seed_user(store: &MemoryStore, name: &str, role: Role) -> User {
        let user = User::new(name.into(), format!("{}@example.com", name), "h".into(), role);
        database::save(store, Table::Users, &user).await.unwrap();
        user
    }

    #[test]
    fn test_normalize_ids() {
        let ids = vec![" a ".to_string(), "b".into(), "".into(), "a".into(), "c".into()];
        assert_eq!(normalize_ids(ids), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_resolve_reports_every_missing_id() {
        let store = MemoryStore::new();
        let admin = seed_user(&store, "bob", Role::Admin).await;

        let err = resolve_instructors(&store, vec![admin.user_id.clone(), "ghost-1".into(), "ghost-2".into()])
            .await
            .unwrap_err();

        match err {
            AppError::Reference { missing, .. } => assert_eq!(missing, vec!["ghost-1", "ghost-2"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_role_requirement_rejects_normal_users() {
        let store = MemoryStore::new();
        let normal = seed_user(&store, "alice", Role::Normal).await;
        let admin = seed_user(&store, "bob", Role::Admin).await;

        let err = resolve_users(
            &store,
            vec![admin.user_id.clone(), normal.user_id.clone()],
            Some(Role::INSTRUCTORS),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Reference { ref missing, .. } if missing == &vec![normal.user_id.clone()]));

        let all = resolve_users(&store, vec![admin.user_id.clone(), normal.user_id.clone()], None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_keeps_input_order() {
        let store = MemoryStore::new();
        let first = seed_user(&store, "first", Role::Admin).await;
        let second = seed_user(&store, "second", Role::Super).await;

        let resolved = resolve_instructors(&store, vec![second.user_id.clone(), first.user_id.clone()])
            .await
            .unwrap();
        assert_eq!(resolved[0].user_id, second.user_id);
        assert_eq!(resolved[1].user_id, first.user_id);
    }

    #[tokio::test]
    async fn test_hydrate_skips_dangling_ids() {
        let store = MemoryStore::new();
        let book = Book {
            book_id: "b1".into(),
            book_name: "Rust".into(),
            book_description: None,
            book_price: None,
            book_cover: None,
            book_link: None,
            created_at: 0,
            updated_at: 0,
        };
        database::save(&store, Table::Books, &book).await.unwrap();

        let books = hydrate_books(&store, &["gone".to_string(), "b1".to_string()]).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].book_id, "b1");
    }
}
