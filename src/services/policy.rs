//! Authorization gate: role and ownership decisions taken before any store access
//! that mutates state.
//!
//! `authorize` is pure. `load_actor` is the single place where an authenticated
//! identity is checked against its stored record (deleted accounts and inactive
//! admins are refused even while their token is still valid).

use crate::database::{self, RecordStore, Table};
use crate::models::{Role, User};
use crate::utils::AppError;

/// The authenticated caller, as carried by the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    SetAdminState,
    CreateCourse,
    /// Update or delete of a course instructed by `instructors`
    ModifyCourse { instructors: &'a [String] },
    /// View or update a single profile
    AccessProfile { target_id: &'a str },
    ManageAnyUser,
    ListUsers,
    /// Create, update or delete books
    ManageCatalog,
    BrowseCatalog,
    Enroll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::Forbidden(reason)),
        }
    }
}

fn deny(reason: &str) -> Decision {
    Decision::Deny(reason.to_string())
}

pub fn authorize(actor: &Actor, operation: Operation<'_>) -> Decision {
    match (actor.role, operation) {
        (Role::Super, Operation::Enroll) => deny("Only normal users can enroll"),
        (Role::Super, _) => Decision::Allow,

        (Role::Admin, Operation::CreateCourse) => Decision::Allow,
        (Role::Admin, Operation::ModifyCourse { instructors }) => {
            if instructors.iter().any(|id| *id == actor.user_id) {
                Decision::Allow
            } else {
                deny("You are not an instructor of this course")
            }
        }

        (_, Operation::AccessProfile { target_id }) => {
            if target_id == actor.user_id {
                Decision::Allow
            } else {
                deny("You can only access your own profile")
            }
        }

        (_, Operation::BrowseCatalog) => Decision::Allow,
        (Role::Normal, Operation::Enroll) => Decision::Allow,

        (Role::Normal, Operation::CreateCourse | Operation::ModifyCourse { .. }) => {
            deny("Only admins can manage courses")
        }
        (
            _,
            Operation::SetAdminState | Operation::ManageAnyUser | Operation::ListUsers | Operation::ManageCatalog,
        ) => deny("Super admin privileges required"),
        (Role::Admin, Operation::Enroll) => deny("Only normal users can enroll"),
    }
}

/// Shortcut for `authorize(..).into_result()`.
pub fn ensure(actor: &Actor, operation: Operation<'_>) -> Result<(), AppError> {
    authorize(actor, operation).into_result()
}

/// The active/inactive predicate applied wherever an admin identity acts.
pub fn ensure_active(user: &User) -> Result<(), AppError> {
    if user.is_active() {
        Ok(())
    } else {
        Err(AppError::forbidden("Account is inactive"))
    }
}

/// Loads the caller's stored record and applies `ensure_active`.
pub async fn load_actor(store: &dyn RecordStore, actor: &Actor) -> Result<User, AppError> {
    let user: User = database::fetch(store, Table::Users, &actor.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if user.user_role != actor.role {
        return Err(AppError::Unauthorized("Token role does not match account".to_string()));
    }

    ensure_active(&user)?;
    Ok(user)
}
