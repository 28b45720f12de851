use mongodb::bson;
use serde::Serialize;

use crate::config::AuthSettings;
use crate::database::{self, RecordStore, StoreError, Table};
use crate::models::{
    Book, Course, EnrollmentRequest, Role, UpdateStateRequest, UpdateUserRequest, User, UserState,
};
use crate::services::auth_service;
use crate::services::policy::{self, Actor, Operation};
use crate::services::resolver;
use crate::services::sync_service::{self, EnrollmentChange, EnrollmentMode};
use crate::utils::validation::{parse_user_state, Mode, Validate};
use crate::utils::AppError;

/// Which family of accounts a route manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Normal users
    Users,
    /// Admins and supers
    Admins,
}

impl Audience {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            Audience::Users => role == Role::Normal,
            Audience::Admins => role.can_instruct(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Audience::Users => "User",
            Audience::Admins => "Admin",
        }
    }
}

/// A committed user write plus any fan-out warnings.
#[derive(Debug)]
pub struct UserWrite {
    pub user: User,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_state: Option<UserState>,
    updated_at: i64,
}

impl UserPatch {
    fn new() -> Self {
        UserPatch {
            user_name: None,
            user_email: None,
            user_password: None,
            user_state: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A user of the given audience, or 404.
async fn find_in(store: &dyn RecordStore, audience: Audience, user_id: &str) -> Result<User, AppError> {
    database::fetch::<User>(store, Table::Users, user_id)
        .await?
        .filter(|user| audience.includes(user.user_role))
        .ok_or_else(|| AppError::not_found(format!("{} not found", audience.label())))
}

async fn apply_patch(store: &dyn RecordStore, user_id: &str, patch: &UserPatch) -> Result<User, AppError> {
    let fields = bson::to_document(patch).map_err(StoreError::from)?;
    database::patch(store, Table::Users, user_id, fields)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Email already exists".to_string()),
            other => other,
        })?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn get_profile(
    store: &dyn RecordStore,
    actor: &Actor,
    audience: Audience,
    user_id: &str,
) -> Result<User, AppError> {
    policy::ensure(actor, Operation::AccessProfile { target_id: user_id })?;
    policy::load_actor(store, actor).await?;
    find_in(store, audience, user_id).await
}

/// Profile update. Role and state cannot be changed here; an instructor's new
/// identity is pushed into every course it teaches.
pub async fn update_profile(
    store: &dyn RecordStore,
    settings: &AuthSettings,
    actor: &Actor,
    audience: Audience,
    user_id: &str,
    request: UpdateUserRequest,
) -> Result<UserWrite, AppError> {
    policy::ensure(actor, Operation::AccessProfile { target_id: user_id })?;
    request.validate(Mode::PartialUpdate)?;
    policy::load_actor(store, actor).await?;
    let target = find_in(store, audience, user_id).await?;

    let mut patch = UserPatch::new();
    patch.user_name = request.user_name.map(|name| name.trim().to_string());

    if let Some(email) = request.user_email {
        let email = auth_service::normalize_email(&email);
        if email != target.user_email {
            if let Some(owner) = auth_service::find_by_email(store, &email).await? {
                if owner.user_id != target.user_id {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }
            }
        }
        patch.user_email = Some(email);
    }

    if let Some(password) = request.user_password {
        patch.user_password = Some(auth_service::hash_password(&password, settings.bcrypt_cost).await?);
    }

    let user = apply_patch(store, user_id, &patch).await?;
    log::info!("✅ {} {} updated by {}", audience.label(), user_id, actor.user_id);

    let report = sync_service::on_instructor_change(store, &user).await;
    Ok(UserWrite {
        user,
        warnings: report.warnings,
    })
}

/// Approves or suspends an admin, then refreshes its snapshot in every course.
pub async fn set_admin_state(
    store: &dyn RecordStore,
    actor: &Actor,
    user_id: &str,
    request: UpdateStateRequest,
) -> Result<UserWrite, AppError> {
    policy::ensure(actor, Operation::SetAdminState)?;
    let state = parse_user_state(request.user_state.as_deref())?;
    policy::load_actor(store, actor).await?;

    let target: User = database::fetch(store, Table::Users, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if target.user_role != Role::Admin {
        return Err(AppError::validation("Only admin accounts can be approved or suspended"));
    }

    let mut patch = UserPatch::new();
    patch.user_state = Some(state);
    let user = apply_patch(store, user_id, &patch).await?;
    log::info!("✅ Admin {} is now {}", user_id, state);

    let report = sync_service::on_instructor_change(store, &user).await;
    Ok(UserWrite {
        user,
        warnings: report.warnings,
    })
}

/// Deletes an account. Instructors still attached to courses are refused.
pub async fn delete_user(
    store: &dyn RecordStore,
    actor: &Actor,
    audience: Audience,
    user_id: &str,
) -> Result<(), AppError> {
    policy::ensure(actor, Operation::ManageAnyUser)?;
    policy::load_actor(store, actor).await?;

    if user_id == actor.user_id {
        return Err(AppError::Conflict("You cannot delete your own account".to_string()));
    }

    let target = find_in(store, audience, user_id).await?;
    if target.user_role.can_instruct() {
        let taught: Vec<Course> =
            database::fetch_by(store, Table::Courses, "course_instructor_ids", user_id).await?;
        if !taught.is_empty() {
            return Err(AppError::Conflict(format!(
                "{} still instructs {} course(s); reassign or delete them first",
                audience.label(),
                taught.len()
            )));
        }
    }

    if !store.delete(Table::Users, user_id).await? {
        return Err(AppError::not_found(format!("{} not found", audience.label())));
    }
    log::info!("🗑️  {} {} deleted by {}", audience.label(), user_id, actor.user_id);
    Ok(())
}

pub async fn list_users(store: &dyn RecordStore, actor: &Actor, audience: Audience) -> Result<Vec<User>, AppError> {
    policy::ensure(actor, Operation::ListUsers)?;
    policy::load_actor(store, actor).await?;

    let users: Vec<User> = database::fetch_all(store, Table::Users).await?;
    Ok(users
        .into_iter()
        .filter(|user| audience.includes(user.user_role))
        .collect())
}

fn enrollment_change(request: EnrollmentRequest, mode: EnrollmentMode, published_only: bool) -> EnrollmentChange {
    EnrollmentChange {
        books: request.user_books.map(|ids| ids.into_vec()),
        courses: request.user_courses.map(|ids| ids.into_vec()),
        mode,
        published_only,
    }
}

/// Super override of a normal user's enrolled books and courses.
pub async fn set_enrollment(
    store: &dyn RecordStore,
    actor: &Actor,
    user_id: &str,
    request: EnrollmentRequest,
) -> Result<User, AppError> {
    policy::ensure(actor, Operation::ManageAnyUser)?;
    policy::load_actor(store, actor).await?;
    let target = find_in(store, Audience::Users, user_id).await?;

    let change = enrollment_change(request, EnrollmentMode::Replace, false);
    sync_service::on_user_enrollment_change(store, &target, change).await
}

/// Self-service enrolment: appends to the caller's lists, published courses only.
pub async fn enroll(store: &dyn RecordStore, actor: &Actor, request: EnrollmentRequest) -> Result<User, AppError> {
    policy::ensure(actor, Operation::Enroll)?;
    let user = policy::load_actor(store, actor).await?;

    let change = enrollment_change(request, EnrollmentMode::Append, true);
    sync_service::on_user_enrollment_change(store, &user, change).await
}

pub async fn enrolled_courses(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<Course>, AppError> {
    policy::ensure(actor, Operation::Enroll)?;
    let user = policy::load_actor(store, actor).await?;
    resolver::hydrate_courses(store, &user.user_courses).await
}

pub async fn enrolled_books(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<Book>, AppError> {
    policy::ensure(actor, Operation::Enroll)?;
    let user = policy::load_actor(store, actor).await?;
    resolver::hydrate_books(store, &user.user_books).await
}
