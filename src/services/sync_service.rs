//! Denormalization synchronizer.
//!
//! Every function here runs after the primary write has succeeded. Fan-out writes
//! to different records are issued concurrently and never retried; a failing one
//! becomes a warning in the returned `SyncReport` instead of an error.
//!
//! Merges are read-check-write: a snapshot list is read, merged by ID and written
//! back only if it changed. Concurrent writers may still interleave (last write wins).

use futures::future::join_all;
use mongodb::bson::{self, Document};
use serde::Serialize;

use crate::database::{self, RecordStore, StoreError, Table};
use crate::models::{
    remove_course_snapshot, upsert_course_snapshot, Book, Course, CourseSnapshot, InstructorSnapshot, User,
};
use crate::services::resolver;
use crate::utils::AppError;

#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn record(&mut self, outcome: Result<(), String>) {
        if let Err(warning) = outcome {
            log::warn!("⚠️  Fan-out step failed: {}", warning);
            self.warnings.push(warning);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn single_field<T: Serialize + ?Sized>(field: &str, value: &T) -> Result<Document, StoreError> {
    let mut fields = Document::new();
    fields.insert(field, bson::to_bson(value)?);
    Ok(fields)
}

/// Re-reads an instructor and rewrites `user_uploaded_courses` with `edit` applied.
async fn rewrite_uploaded_courses<F>(store: &dyn RecordStore, instructor_id: &str, edit: F) -> Result<(), String>
where
    F: FnOnce(&[CourseSnapshot]) -> Vec<CourseSnapshot>,
{
    let user: User = database::fetch(store, Table::Users, instructor_id)
        .await
        .map_err(|e| format!("instructor {}: {}", instructor_id, e))?
        .ok_or_else(|| format!("instructor {} no longer exists", instructor_id))?;

    let merged = edit(&user.user_uploaded_courses);
    if merged == user.user_uploaded_courses {
        return Ok(());
    }

    let fields = single_field("user_uploaded_courses", &merged)
        .map_err(|e| format!("instructor {}: {}", instructor_id, e))?;

    match store.update_fields(Table::Users, instructor_id, fields).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(format!("instructor {} no longer exists", instructor_id)),
        Err(e) => Err(format!("instructor {}: {}", instructor_id, e)),
    }
}

/// Upserts the course snapshot into every current instructor and removes it from
/// instructors that were dropped by this write.
pub async fn on_course_write(store: &dyn RecordStore, course: &Course, previous_instructors: &[String]) -> SyncReport {
    let snapshot = CourseSnapshot::from(course);

    let upserts = course.course_instructor_ids.iter().map(|id| {
        let snapshot = snapshot.clone();
        rewrite_uploaded_courses(store, id, move |list| upsert_course_snapshot(list, snapshot))
    });

    let removals = previous_instructors
        .iter()
        .filter(|id| !course.is_instructed_by(id))
        .map(|id| {
            rewrite_uploaded_courses(store, id, |list| remove_course_snapshot(list, &course.course_id))
        });

    let (upserted, removed) = futures::join!(join_all(upserts), join_all(removals));

    let mut report = SyncReport::default();
    for outcome in upserted.into_iter().chain(removed) {
        report.record(outcome);
    }

    if report.is_clean() {
        log::info!(
            "🔄 Course {} synced to {} instructor(s)",
            course.course_id,
            course.course_instructor_ids.len()
        );
    } else {
        log::warn!("⚠️  Course {} synced with {} warning(s)", course.course_id, report.warnings.len());
    }
    report
}

/// Removes a deleted course from every instructor's uploaded list.
pub async fn on_course_delete(store: &dyn RecordStore, course: &Course) -> SyncReport {
    let removals = course.course_instructor_ids.iter().map(|id| {
        rewrite_uploaded_courses(store, id, |list| remove_course_snapshot(list, &course.course_id))
    });

    let mut report = SyncReport::default();
    for outcome in join_all(removals).await {
        report.record(outcome);
    }
    report
}

/// Pushes a fresh instructor snapshot into every course the user instructs.
pub async fn on_instructor_change(store: &dyn RecordStore, user: &User) -> SyncReport {
    let mut report = SyncReport::default();
    if !user.user_role.can_instruct() {
        return report;
    }

    let courses: Vec<Course> =
        match database::fetch_by(store, Table::Courses, "course_instructor_ids", &user.user_id).await {
            Ok(courses) => courses,
            Err(e) => {
                report.record(Err(format!("courses of instructor {}: {}", user.user_id, e)));
                return report;
            }
        };

    let fresh = InstructorSnapshot::from(user);
    let updates = courses.iter().map(|course| {
        let rebuilt = course.with_instructor_snapshot(&fresh);
        async move {
            if rebuilt == course.course_instructor {
                return Ok(());
            }
            let fields = single_field("course_instructor", &rebuilt)
                .map_err(|e| format!("course {}: {}", course.course_id, e))?;
            match store.update_fields(Table::Courses, &course.course_id, fields).await {
                Ok(Some(_)) => Ok(()),
                // Deleted meanwhile; nothing left to keep in sync
                Ok(None) => Ok(()),
                Err(e) => Err(format!("course {}: {}", course.course_id, e)),
            }
        }
    });

    for outcome in join_all(updates).await {
        report.record(outcome);
    }

    if report.is_clean() {
        log::info!("🔄 Instructor {} synced into {} course(s)", user.user_id, courses.len());
    } else {
        log::warn!("⚠️  Instructor {} synced with {} warning(s)", user.user_id, report.warnings.len());
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentMode {
    /// The given lists become the user's lists
    Replace,
    /// The given IDs are added after the existing ones, skipping duplicates
    Append,
}

#[derive(Debug, Clone)]
pub struct EnrollmentChange {
    pub books: Option<Vec<String>>,
    pub courses: Option<Vec<String>>,
    pub mode: EnrollmentMode,
    /// Unpublished courses count as unresolved
    pub published_only: bool,
}

fn merge_ids(existing: &[String], incoming: Vec<String>, mode: EnrollmentMode) -> Vec<String> {
    match mode {
        EnrollmentMode::Replace => incoming,
        EnrollmentMode::Append => {
            let mut merged = existing.to_vec();
            for id in incoming {
                if !merged.contains(&id) {
                    merged.push(id);
                }
            }
            merged
        }
    }
}

/// Splits a resolution outcome into resolved IDs, moving unresolved ones into `missing`.
fn resolved_ids<T>(
    outcome: Result<Vec<T>, AppError>,
    key: impl Fn(&T) -> &str,
    missing: &mut Vec<String>,
) -> Result<Vec<String>, AppError> {
    match outcome {
        Ok(items) => Ok(items.iter().map(|item| key(item).to_string()).collect()),
        Err(AppError::Reference { missing: ids, .. }) => {
            missing.extend(ids);
            Ok(Vec::new())
        }
        Err(other) => Err(other),
    }
}

/// Validates and stores a change to a user's enrolled books and courses.
///
/// Lists hold bare IDs; every ID must resolve before anything is written, and
/// all unresolved IDs across both lists are reported together.
pub async fn on_user_enrollment_change(
    store: &dyn RecordStore,
    user: &User,
    change: EnrollmentChange,
) -> Result<User, AppError> {
    if change.books.is_none() && change.courses.is_none() {
        return Err(AppError::validation("Provide user_books and/or user_courses"));
    }

    let books = change.books.map(resolver::normalize_ids);
    let courses = change.courses.map(resolver::normalize_ids);

    let (book_outcome, course_outcome) = futures::join!(
        resolver::resolve_books(store, books.clone().unwrap_or_default()),
        resolver::resolve_courses(store, courses.clone().unwrap_or_default(), change.published_only),
    );

    let mut missing = Vec::new();
    let book_ids = resolved_ids(book_outcome, |book: &Book| book.book_id.as_str(), &mut missing)?;
    let course_ids = resolved_ids(course_outcome, |course: &Course| course.course_id.as_str(), &mut missing)?;
    if !missing.is_empty() {
        return Err(AppError::Reference {
            message: format!("Invalid book/course reference(s): {}", missing.join(", ")),
            missing,
        });
    }

    let mut fields = Document::new();
    if books.is_some() {
        let merged = merge_ids(&user.user_books, book_ids, change.mode);
        fields.insert("user_books", bson::to_bson(&merged).map_err(StoreError::from)?);
    }
    if courses.is_some() {
        let merged = merge_ids(&user.user_courses, course_ids, change.mode);
        fields.insert("user_courses", bson::to_bson(&merged).map_err(StoreError::from)?);
    }
    fields.insert("updated_at", chrono::Utc::now().timestamp());

    database::patch::<User>(store, Table::Users, &user.user_id, fields)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{Role, UserState};
    use async_trait::async_trait;

    async fn seed_instructor(store: &dyn RecordStore, name: &str) -> User {
        let mut user = User::new(name.into(), format!("{}@example.com", name), "h".into(), Role::Admin);
        user.user_state = UserState::Active;
        database::save(store, Table::Users, &user).await.unwrap();
        user
    }

    fn course_for(id: &str, instructors: &[&User]) -> Course {
        Course {
            course_id: id.into(),
            course_name: format!("Course {}", id),
            course_description: "d".into(),
            course_price: 10.0,
            course_instructor_ids: instructors.iter().map(|u| u.user_id.clone()).collect(),
            course_instructor: instructors.iter().map(|u| InstructorSnapshot::from(*u)).collect(),
            course_image: None,
            course_videos: vec![],
            course_lessons: vec![],
            course_files: vec![],
            course_published: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    async fn uploaded(store: &dyn RecordStore, user_id: &str) -> Vec<CourseSnapshot> {
        database::fetch::<User>(store, Table::Users, user_id)
            .await
            .unwrap()
            .unwrap()
            .user_uploaded_courses
    }

    /// Delegates to a MemoryStore but fails every `update_fields` on one table.
    struct FailingUpdates {
        inner: MemoryStore,
        table: Table,
    }

    #[async_trait]
    impl RecordStore for FailingUpdates {
        fn backend(&self) -> &'static str {
            "failing"
        }
        async fn get(&self, table: Table, key: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(table, key).await
        }
        async fn put(&self, table: Table, item: Document) -> Result<(), StoreError> {
            self.inner.put(table, item).await
        }
        async fn scan(&self, table: Table) -> Result<Vec<Document>, StoreError> {
            self.inner.scan(table).await
        }
        async fn find_by(&self, table: Table, field: &str, value: &str) -> Result<Vec<Document>, StoreError> {
            self.inner.find_by(table, field, value).await
        }
        async fn update_fields(&self, table: Table, key: &str, fields: Document) -> Result<Option<Document>, StoreError> {
            if table == self.table {
                return Err(StoreError::Backend("write rejected".into()));
            }
            self.inner.update_fields(table, key, fields).await
        }
        async fn delete(&self, table: Table, key: &str) -> Result<bool, StoreError> {
            self.inner.delete(table, key).await
        }
    }

    #[tokio::test]
    async fn test_course_write_is_idempotent() {
        let store = MemoryStore::new();
        let bob = seed_instructor(&store, "bob").await;
        let course = course_for("c1", &[&bob]);

        assert!(on_course_write(&store, &course, &[]).await.is_clean());
        assert!(on_course_write(&store, &course, &[]).await.is_clean());

        let list = uploaded(&store, &bob.user_id).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].course_id, "c1");
    }

    #[tokio::test]
    async fn test_course_write_replaces_snapshot_in_place() {
        let store = MemoryStore::new();
        let bob = seed_instructor(&store, "bob").await;
        on_course_write(&store, &course_for("c1", &[&bob]), &[]).await;
        on_course_write(&store, &course_for("c2", &[&bob]), &[]).await;

        let mut renamed = course_for("c1", &[&bob]);
        renamed.course_name = "Renamed".into();
        on_course_write(&store, &renamed, &[bob.user_id.clone()]).await;

        let list = uploaded(&store, &bob.user_id).await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].course_name, "Renamed");
        assert_eq!(list[1].course_id, "c2");
    }

    #[tokio::test]
    async fn test_dropped_instructor_loses_snapshot() {
        let store = MemoryStore::new();
        let bob = seed_instructor(&store, "bob").await;
        let carol = seed_instructor(&store, "carol").await;

        let course = course_for("c1", &[&bob, &carol]);
        on_course_write(&store, &course, &[]).await;

        let reassigned = course_for("c1", &[&carol]);
        let report = on_course_write(&store, &reassigned, &course.course_instructor_ids).await;
        assert!(report.is_clean());

        assert!(uploaded(&store, &bob.user_id).await.is_empty());
        assert_eq!(uploaded(&store, &carol.user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_course_delete_removes_snapshots() {
        let store = MemoryStore::new();
        let bob = seed_instructor(&store, "bob").await;
        let course = course_for("c1", &[&bob]);
        on_course_write(&store, &course, &[]).await;

        assert!(on_course_delete(&store, &course).await.is_clean());
        assert!(uploaded(&store, &bob.user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_instructor_change_converges_on_every_course() {
        let store = MemoryStore::new();
        let mut bob = seed_instructor(&store, "bob").await;
        let carol = seed_instructor(&store, "carol").await;

        for course in [course_for("c1", &[&bob]), course_for("c2", &[&carol, &bob]), course_for("c3", &[&carol])] {
            database::save(&store, Table::Courses, &course).await.unwrap();
        }

        bob.user_state = UserState::Inactive;
        bob.user_name = "Robert".into();
        database::save(&store, Table::Users, &bob).await.unwrap();

        assert!(on_instructor_change(&store, &bob).await.is_clean());

        for id in ["c1", "c2"] {
            let course: Course = database::fetch(&store, Table::Courses, id).await.unwrap().unwrap();
            let snapshot = course.course_instructor.iter().find(|s| s.user_id == bob.user_id).unwrap();
            assert_eq!(snapshot.user_state, UserState::Inactive);
            assert_eq!(snapshot.user_name, "Robert");
        }

        let untouched: Course = database::fetch(&store, Table::Courses, "c3").await.unwrap().unwrap();
        assert_eq!(untouched.course_instructor[0].user_name, "carol");

        let shared: Course = database::fetch(&store, Table::Courses, "c2").await.unwrap().unwrap();
        assert_eq!(shared.course_instructor[0].user_id, carol.user_id);
    }

    #[tokio::test]
    async fn test_fan_out_failure_is_a_warning() {
        let store = FailingUpdates { inner: MemoryStore::new(), table: Table::Users };
        let bob = seed_instructor(&store, "bob").await;

        let report = on_course_write(&store, &course_for("c1", &[&bob]), &[]).await;
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains(&bob.user_id));
    }

    #[tokio::test]
    async fn test_missing_instructor_is_a_warning() {
        let store = MemoryStore::new();
        let ghost = User::new("ghost".into(), "ghost@example.com".into(), "h".into(), Role::Admin);
        let report = on_course_write(&store, &course_for("c1", &[&ghost]), &[]).await;
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_enrollment_append_and_replace() {
        let store = MemoryStore::new();
        let alice = User::new("alice".into(), "alice@example.com".into(), "h".into(), Role::Normal);
        database::save(&store, Table::Users, &alice).await.unwrap();

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
        let bob = seed_instructor(&store, "bob").await;
        database::save(&store, Table::Courses, &course_for("c1", &[&bob])).await.unwrap();

        let append = |books: Vec<&str>, courses: Vec<&str>| EnrollmentChange {
            books: Some(books.into_iter().map(String::from).collect()),
            courses: Some(courses.into_iter().map(String::from).collect()),
            mode: EnrollmentMode::Append,
            published_only: true,
        };

        let updated = on_user_enrollment_change(&store, &alice, append(vec!["b1"], vec!["c1"])).await.unwrap();
        let updated = on_user_enrollment_change(&store, &updated, append(vec!["b1"], vec!["c1"])).await.unwrap();
        assert_eq!(updated.user_books, vec!["b1"]);
        assert_eq!(updated.user_courses, vec!["c1"]);

        let replace = EnrollmentChange {
            books: Some(vec![]),
            courses: None,
            mode: EnrollmentMode::Replace,
            published_only: false,
        };
        let updated = on_user_enrollment_change(&store, &updated, replace).await.unwrap();
        assert!(updated.user_books.is_empty());
        assert_eq!(updated.user_courses, vec!["c1"]);
    }

    #[tokio::test]
    async fn test_enrollment_rejects_unknown_ids_without_writing() {
        let store = MemoryStore::new();
        let alice = User::new("alice".into(), "alice@example.com".into(), "h".into(), Role::Normal);
        database::save(&store, Table::Users, &alice).await.unwrap();

        let change = EnrollmentChange {
            books: Some(vec!["nope-book".into()]),
            courses: Some(vec!["nope-course".into()]),
            mode: EnrollmentMode::Append,
            published_only: true,
        };
        let err = on_user_enrollment_change(&store, &alice, change).await.unwrap_err();
        match err {
            AppError::Reference { missing, .. } => assert_eq!(missing, vec!["nope-book", "nope-course"]),
            other => panic!("unexpected error: {:?}", other),
        }

        let stored: User = database::fetch(&store, Table::Users, &alice.user_id).await.unwrap().unwrap();
        assert!(stored.user_books.is_empty());
    }
}
