use mongodb::bson;
use serde::Serialize;

use crate::database::{self, RecordStore, StoreError, Table};
use crate::models::{
    Course, CourseFile, CreateCourseRequest, InstructorSnapshot, Lesson, Role, UpdateCourseRequest,
};
use crate::services::policy::{self, Actor, Operation};
use crate::services::{resolver, sync_service};
use crate::utils::validation::{Mode, Validate};
use crate::utils::AppError;

/// A committed course write plus any fan-out warnings.
#[derive(Debug)]
pub struct CourseWrite {
    pub course: Course,
    pub warnings: Vec<String>,
}

/// Sparse course update written through `update_fields`.
#[derive(Debug, Serialize, Default)]
struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    course_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_instructor_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_instructor: Option<Vec<InstructorSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_videos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_lessons: Option<Vec<Lesson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_files: Option<Vec<CourseFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_published: Option<bool>,
    updated_at: i64,
}

/// Instructor IDs for a write by `actor`: an admin always instructs its own course,
/// a super with no explicit instructors becomes the instructor.
fn instructor_ids_for(actor: &Actor, requested: Vec<String>) -> Vec<String> {
    let mut ids = resolver::normalize_ids(requested);
    let must_include_self = match actor.role {
        Role::Admin => true,
        Role::Super => ids.is_empty(),
        Role::Normal => false,
    };
    if must_include_self && !ids.contains(&actor.user_id) {
        ids.insert(0, actor.user_id.clone());
    }
    ids
}

async fn instructor_snapshots(store: &dyn RecordStore, ids: Vec<String>) -> Result<Vec<InstructorSnapshot>, AppError> {
    let instructors = resolver::resolve_instructors(store, ids).await?;
    Ok(instructors.iter().map(InstructorSnapshot::from).collect())
}

async fn find_course(store: &dyn RecordStore, course_id: &str) -> Result<Course, AppError> {
    database::fetch(store, Table::Courses, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))
}

pub async fn create_course(
    store: &dyn RecordStore,
    actor: &Actor,
    request: CreateCourseRequest,
) -> Result<CourseWrite, AppError> {
    policy::ensure(actor, Operation::CreateCourse)?;
    request.validate(Mode::Create)?;
    policy::load_actor(store, actor).await?;

    let (Some(course_name), Some(course_description), Some(course_price)) =
        (request.course_name, request.course_description, request.course_price)
    else {
        return Err(AppError::validation("course_name, course_description and course_price are required"));
    };

    let requested = request.course_instructor.map(|ids| ids.into_vec()).unwrap_or_default();
    let course_instructor_ids = instructor_ids_for(actor, requested);
    let course_instructor = instructor_snapshots(store, course_instructor_ids.clone()).await?;

    let now = chrono::Utc::now().timestamp();
    let course = Course {
        course_id: uuid::Uuid::new_v4().to_string(),
        course_name: course_name.trim().to_string(),
        course_description,
        course_price,
        course_instructor_ids,
        course_instructor,
        course_image: request.course_image,
        course_videos: request.course_videos.unwrap_or_default(),
        course_lessons: request.course_lessons.unwrap_or_default(),
        course_files: request.course_files.unwrap_or_default(),
        course_published: request.course_published.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };

    database::save(store, Table::Courses, &course).await?;
    log::info!("✅ Course {} created by {}", course.course_id, actor.user_id);

    let report = sync_service::on_course_write(store, &course, &[]).await;

    Ok(CourseWrite {
        course,
        warnings: report.warnings,
    })
}

pub async fn update_course(
    store: &dyn RecordStore,
    actor: &Actor,
    course_id: &str,
    request: UpdateCourseRequest,
) -> Result<CourseWrite, AppError> {
    request.validate(Mode::PartialUpdate)?;
    policy::load_actor(store, actor).await?;

    let existing = find_course(store, course_id).await?;
    policy::ensure(
        actor,
        Operation::ModifyCourse {
            instructors: &existing.course_instructor_ids,
        },
    )?;

    let mut patch = CoursePatch {
        course_name: request.course_name.map(|name| name.trim().to_string()),
        course_description: request.course_description,
        course_price: request.course_price,
        course_image: request.course_image,
        course_videos: request.course_videos,
        course_lessons: request.course_lessons,
        course_files: request.course_files,
        course_published: request.course_published,
        updated_at: chrono::Utc::now().timestamp(),
        ..Default::default()
    };

    if let Some(requested) = request.course_instructor {
        let ids = instructor_ids_for(actor, requested.into_vec());
        patch.course_instructor = Some(instructor_snapshots(store, ids.clone()).await?);
        patch.course_instructor_ids = Some(ids);
    }

    let fields = bson::to_document(&patch).map_err(StoreError::from)?;
    let course: Course = database::patch(store, Table::Courses, course_id, fields)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;

    log::info!("✅ Course {} updated by {}", course_id, actor.user_id);

    let report = sync_service::on_course_write(store, &course, &existing.course_instructor_ids).await;

    Ok(CourseWrite {
        course,
        warnings: report.warnings,
    })
}

/// Deletes a course and returns the fan-out warnings.
pub async fn delete_course(store: &dyn RecordStore, actor: &Actor, course_id: &str) -> Result<Vec<String>, AppError> {
    policy::load_actor(store, actor).await?;

    let course = find_course(store, course_id).await?;
    policy::ensure(
        actor,
        Operation::ModifyCourse {
            instructors: &course.course_instructor_ids,
        },
    )?;

    if !store.delete(Table::Courses, course_id).await? {
        return Err(AppError::not_found("Course not found"));
    }
    log::info!("🗑️  Course {} deleted by {}", course_id, actor.user_id);

    Ok(sync_service::on_course_delete(store, &course).await.warnings)
}

/// Every course; normal users only see published ones.
pub async fn list_courses(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<Course>, AppError> {
    policy::ensure(actor, Operation::BrowseCatalog)?;
    if actor.role != Role::Normal {
        policy::load_actor(store, actor).await?;
    }

    let courses: Vec<Course> = database::fetch_all(store, Table::Courses).await?;
    Ok(courses
        .into_iter()
        .filter(|course| actor.role != Role::Normal || course.course_published)
        .collect())
}

/// Courses the caller instructs; every course for a super.
pub async fn list_own_courses(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<Course>, AppError> {
    policy::ensure(actor, Operation::CreateCourse)?;
    policy::load_actor(store, actor).await?;

    let courses = match actor.role {
        Role::Super => database::fetch_all(store, Table::Courses).await?,
        _ => database::fetch_by(store, Table::Courses, "course_instructor_ids", &actor.user_id).await?,
    };
    Ok(courses)
}

pub async fn get_course(store: &dyn RecordStore, actor: &Actor, course_id: &str) -> Result<Course, AppError> {
    policy::ensure(actor, Operation::BrowseCatalog)?;
    if actor.role != Role::Normal {
        policy::load_actor(store, actor).await?;
    }

    let course = find_course(store, course_id).await?;
    if actor.role == Role::Normal && !course.course_published {
        return Err(AppError::not_found("Course not found"));
    }
    Ok(course)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{OneOrMany, User, UserState};

    async fn seed(store: &MemoryStore, name: &str, role: Role) -> (User, Actor) {
        let mut user = User::new(name.into(), format!("{}@example.com", name), "h".into(), role);
        user.user_state = UserState::Active;
        database::save(store, Table::Users, &user).await.unwrap();
        let actor = Actor {
            user_id: user.user_id.clone(),
            role,
        };
        (user, actor)
    }

    fn request(name: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            course_name: Some(name.into()),
            course_description: Some("Learn it".into()),
            course_price: Some(49.9),
            ..Default::default()
        }
    }

    async fn uploaded_ids(store: &MemoryStore, user_id: &str) -> Vec<String> {
        let user: User = database::fetch(store, Table::Users, user_id).await.unwrap().unwrap();
        user.user_uploaded_courses.into_iter().map(|s| s.course_id).collect()
    }

    #[tokio::test]
    async fn test_admin_becomes_instructor() {
        let store = MemoryStore::new();
        let (bob, bob_actor) = seed(&store, "bob", Role::Admin).await;

        let written = create_course(&store, &bob_actor, request("Rust")).await.unwrap();
        assert!(written.warnings.is_empty());
        assert_eq!(written.course.course_instructor_ids, vec![bob.user_id.clone()]);
        assert_eq!(written.course.course_instructor[0].user_email, "bob@example.com");
        assert_eq!(uploaded_ids(&store, &bob.user_id).await, vec![written.course.course_id]);
    }

    #[tokio::test]
    async fn test_super_assigns_other_instructors() {
        let store = MemoryStore::new();
        let (_, root) = seed(&store, "root", Role::Super).await;
        let (bob, _) = seed(&store, "bob", Role::Admin).await;

        let mut req = request("Rust");
        req.course_instructor = Some(OneOrMany::One(bob.user_id.clone()));
        let written = create_course(&store, &root, req).await.unwrap();

        assert_eq!(written.course.course_instructor_ids, vec![bob.user_id.clone()]);
        assert_eq!(uploaded_ids(&store, &bob.user_id).await.len(), 1);
        assert!(uploaded_ids(&store, &root.user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_instructor_creates_nothing() {
        let store = MemoryStore::new();
        let (_, root) = seed(&store, "root", Role::Super).await;
        let (bob, _) = seed(&store, "bob", Role::Admin).await;

        let mut req = request("Rust");
        req.course_instructor = Some(OneOrMany::Many(vec![bob.user_id.clone(), "ghost".into()]));
        let err = create_course(&store, &root, req).await.unwrap_err();

        match err {
            AppError::Reference { missing, .. } => assert_eq!(missing, vec!["ghost"]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.scan(Table::Courses).await.unwrap().is_empty());
        assert!(uploaded_ids(&store, &bob.user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_normal_user_cannot_be_instructor() {
        let store = MemoryStore::new();
        let (_, root) = seed(&store, "root", Role::Super).await;
        let (alice, _) = seed(&store, "alice", Role::Normal).await;

        let mut req = request("Rust");
        req.course_instructor = Some(OneOrMany::One(alice.user_id.clone()));
        assert!(matches!(
            create_course(&store, &root, req).await,
            Err(AppError::Reference { .. })
        ));
    }

    #[tokio::test]
    async fn test_inactive_admin_cannot_create() {
        let store = MemoryStore::new();
        let pending = User::new("eve".into(), "eve@example.com".into(), "h".into(), Role::Admin);
        database::save(&store, Table::Users, &pending).await.unwrap();
        let actor = Actor {
            user_id: pending.user_id.clone(),
            role: Role::Admin,
        };

        assert!(matches!(
            create_course(&store, &actor, request("Rust")).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_only_instructors_modify() {
        let store = MemoryStore::new();
        let (_, bob) = seed(&store, "bob", Role::Admin).await;
        let (_, carol) = seed(&store, "carol", Role::Admin).await;
        let course = create_course(&store, &bob, request("Rust")).await.unwrap().course;

        let change = UpdateCourseRequest {
            course_name: Some("Hijacked".into()),
            ..Default::default()
        };
        let err = update_course(&store, &carol, &course.course_id, change).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let stored = find_course(&store, &course.course_id).await.unwrap();
        assert_eq!(stored.course_name, "Rust");

        assert!(matches!(
            delete_course(&store, &carol, &course.course_id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_update_is_sparse_and_resyncs() {
        let store = MemoryStore::new();
        let (bob_user, bob) = seed(&store, "bob", Role::Admin).await;
        let course = create_course(&store, &bob, request("Rust")).await.unwrap().course;

        let change = UpdateCourseRequest {
            course_price: Some(99.0),
            ..Default::default()
        };
        let updated = update_course(&store, &bob, &course.course_id, change).await.unwrap();
        assert_eq!(updated.course.course_name, "Rust");
        assert_eq!(updated.course.course_price, 99.0);

        let user: User = database::fetch(&store, Table::Users, &bob_user.user_id).await.unwrap().unwrap();
        assert_eq!(user.user_uploaded_courses.len(), 1);
        assert_eq!(user.user_uploaded_courses[0].course_price, 99.0);
    }

    #[tokio::test]
    async fn test_instructor_reassignment_moves_snapshot() {
        let store = MemoryStore::new();
        let (_, root) = seed(&store, "root", Role::Super).await;
        let (bob, _) = seed(&store, "bob", Role::Admin).await;
        let (carol, _) = seed(&store, "carol", Role::Admin).await;

        let mut req = request("Rust");
        req.course_instructor = Some(OneOrMany::One(bob.user_id.clone()));
        let course = create_course(&store, &root, req).await.unwrap().course;

        let change = UpdateCourseRequest {
            course_instructor: Some(OneOrMany::One(carol.user_id.clone())),
            ..Default::default()
        };
        let updated = update_course(&store, &root, &course.course_id, change).await.unwrap();

        assert_eq!(updated.course.course_instructor_ids, vec![carol.user_id.clone()]);
        assert!(uploaded_ids(&store, &bob.user_id).await.is_empty());
        assert_eq!(uploaded_ids(&store, &carol.user_id).await, vec![course.course_id]);
    }

    #[tokio::test]
    async fn test_delete_cleans_instructor_list() {
        let store = MemoryStore::new();
        let (bob_user, bob) = seed(&store, "bob", Role::Admin).await;
        let course = create_course(&store, &bob, request("Rust")).await.unwrap().course;

        let warnings = delete_course(&store, &bob, &course.course_id).await.unwrap();
        assert!(warnings.is_empty());
        assert!(uploaded_ids(&store, &bob_user.user_id).await.is_empty());
        assert!(matches!(
            get_course(&store, &bob, &course.course_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_visibility_for_normal_users() {
        let store = MemoryStore::new();
        let (_, bob) = seed(&store, "bob", Role::Admin).await;
        let (_, alice) = seed(&store, "alice", Role::Normal).await;

        let draft = create_course(&store, &bob, request("Draft")).await.unwrap().course;
        let mut published = request("Live");
        published.course_published = Some(true);
        create_course(&store, &bob, published).await.unwrap();

        let seen = list_courses(&store, &alice).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].course_name, "Live");
        assert_eq!(list_courses(&store, &bob).await.unwrap().len(), 2);

        assert!(matches!(
            get_course(&store, &alice, &draft.course_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_own_courses() {
        let store = MemoryStore::new();
        let (_, root) = seed(&store, "root", Role::Super).await;
        let (_, bob) = seed(&store, "bob", Role::Admin).await;
        let (_, carol) = seed(&store, "carol", Role::Admin).await;

        create_course(&store, &bob, request("Bob's")).await.unwrap();
        create_course(&store, &carol, request("Carol's")).await.unwrap();

        let mine = list_own_courses(&store, &bob).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].course_name, "Bob's");
        assert_eq!(list_own_courses(&store, &root).await.unwrap().len(), 2);
    }
}
