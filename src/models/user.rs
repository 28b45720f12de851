use serde::{Deserialize, Serialize};
use std::fmt;

use super::course::CourseSnapshot;

/// Role of a user. Only a super actor can change it, through the state endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Normal,
    Admin,
    Super,
}

impl Role {
    pub const INSTRUCTORS: &'static [Role] = &[Role::Admin, Role::Super];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Admin => "admin",
            Role::Super => "super",
        }
    }

    pub fn can_instruct(&self) -> bool {
        Role::INSTRUCTORS.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserState::Active => f.write_str("active"),
            UserState::Inactive => f.write_str("inactive"),
        }
    }
}

/// User record as stored in the "users" table.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_password: String,
    pub user_role: Role,
    #[serde(default)]
    pub user_state: UserState,
    /// Enrolled book IDs (bare references, hydrated on read)
    #[serde(default)]
    pub user_books: Vec<String>,
    /// Enrolled course IDs (bare references, hydrated on read)
    #[serde(default)]
    pub user_courses: Vec<String>,
    /// Snapshots of courses this user instructs, kept in sync on every course write
    #[serde(default)]
    pub user_uploaded_courses: Vec<CourseSnapshot>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl User {
    pub fn new(user_name: String, user_email: String, password_hash: String, role: Role) -> Self {
        let now = chrono::Utc::now().timestamp();
        let user_state = match role {
            Role::Admin => UserState::Inactive,
            Role::Normal | Role::Super => UserState::Active,
        };

        User {
            user_id: uuid::Uuid::new_v4().to_string(),
            user_name,
            user_email,
            user_password: password_hash,
            user_role: role,
            user_state,
            user_books: Vec::new(),
            user_courses: Vec::new(),
            user_uploaded_courses: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Normal users are implicitly active; only admins carry a meaningful state.
    pub fn is_active(&self) -> bool {
        match self.user_role {
            Role::Normal => true,
            Role::Admin | Role::Super => self.user_state == UserState::Active,
        }
    }
}

/// Sanitised user, safe to return to callers (no password hash).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_role: Role,
    pub user_state: UserState,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub user_books: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub user_courses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_uploaded_courses: Option<Vec<CourseSnapshot>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let user_uploaded_courses = user
            .user_role
            .can_instruct()
            .then_some(user.user_uploaded_courses);

        UserResponse {
            user_id: user.user_id,
            user_name: user.user_name,
            user_email: user.user_email,
            user_role: user.user_role,
            user_state: user.user_state,
            user_books: user.user_books,
            user_courses: user.user_courses,
            user_uploaded_courses,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Identity subset of a User embedded in every course it instructs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InstructorSnapshot {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_role: Role,
    pub user_state: UserState,
}

impl From<&User> for InstructorSnapshot {
    fn from(user: &User) -> Self {
        InstructorSnapshot {
            user_id: user.user_id.clone(),
            user_name: user.user_name.clone(),
            user_email: user.user_email.clone(),
            user_role: user.user_role,
            user_state: user.user_state,
        }
    }
}

/// Body for both registration routes; the route decides the role.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_password: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub user_email: Option<String>,
    pub user_password: Option<String>,
}

/// Profile update. `user_role`, `user_state` and the enrolment lists are not part of
/// this body, so whatever a caller sends for them is dropped during deserialisation.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_password: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStateRequest {
    pub user_state: Option<String>,
}

/// Lists of book/course IDs; each field may be a single ID or an array.
#[derive(Debug, Deserialize, Default)]
pub struct EnrollmentRequest {
    pub user_books: Option<super::OneOrMany<String>>,
    pub user_courses: Option<super::OneOrMany<String>>,
}
