use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthSettings;
use crate::database::{self, RecordStore, Table};
use crate::models::{LoginRequest, RegisterRequest, Role, User, UserResponse};
use crate::services::policy::Actor;
use crate::utils::validation::{Mode, Validate};
use crate::utils::AppError;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: String,
    pub user_role: Role,
    pub iat: usize, // issued at
    pub exp: usize, // expiration
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id.clone(),
            role: self.user_role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
    /// Absent for admins awaiting approval: they cannot authenticate yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginUser {
    pub user_id: String,
    pub user_role: Role,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub user: LoginUser,
    pub token: String,
}

// Generate JWT token
pub fn generate_jwt(user: &User, settings: &AuthSettings) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user.user_id.clone(),
        user_role: user.user_role,
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(settings.token_ttl_secs)).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(token: &str, settings: &AuthSettings) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// bcrypt is CPU bound; run it off the async workers.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Looks a user up through the email index.
pub async fn find_by_email(store: &dyn RecordStore, email: &str) -> Result<Option<User>, AppError> {
    let mut found: Vec<User> =
        database::fetch_by(store, Table::Users, "user_email", &normalize_email(email)).await?;
    Ok(found.pop())
}

/// Registration for both public routes. The role comes from the route, never the body.
pub async fn register(
    store: &dyn RecordStore,
    settings: &AuthSettings,
    request: &RegisterRequest,
    role: Role,
) -> Result<AuthResponse, AppError> {
    request.validate(Mode::Create)?;

    let (Some(name), Some(email), Some(password)) = (
        request.user_name.as_deref(),
        request.user_email.as_deref(),
        request.user_password.as_deref(),
    ) else {
        return Err(AppError::validation("user_name, user_email and user_password are required"));
    };

    if find_by_email(store, email).await?.is_some() {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_password(password, settings.bcrypt_cost).await?;
    let user = User::new(name.trim().to_string(), normalize_email(email), password_hash, role);

    // The unique index still catches a racing registration with the same email
    database::save(store, Table::Users, &user).await.map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email already exists".to_string()),
        other => other,
    })?;

    let token = if user.is_active() {
        Some(generate_jwt(&user, settings)?)
    } else {
        None
    };

    log::info!("✅ {} registered: {} ({})", role, user.user_email, user.user_state);

    Ok(AuthResponse {
        success: true,
        user: UserResponse::from(user),
        token,
    })
}

// User login
pub async fn login(
    store: &dyn RecordStore,
    settings: &AuthSettings,
    request: &LoginRequest,
) -> Result<LoginResponse, AppError> {
    let (Some(email), Some(password)) = (request.user_email.as_deref(), request.user_password.as_deref())
    else {
        return Err(AppError::validation("user_email and user_password are required"));
    };

    let user = find_by_email(store, email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password(password, &user.user_password).await? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if !user.is_active() {
        return Err(AppError::forbidden("Account is inactive. Wait for a super admin to approve it."));
    }

    let token = generate_jwt(&user, settings)?;

    Ok(LoginResponse {
        success: true,
        user: LoginUser {
            user_id: user.user_id,
            user_role: user.user_role,
        },
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
            bcrypt_cost: 4,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            user_name: Some("Alice".into()),
            user_email: Some(email.into()),
            user_password: Some("password123".into()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            user_email: Some(email.into()),
            user_password: Some(password.into()),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = User::new("A".into(), "a@example.com".into(), "h".into(), Role::Normal);
        let token = generate_jwt(&user, &settings()).unwrap();
        let claims = verify_token(&token, &settings()).unwrap();
        assert_eq!(claims.user_id, user.user_id);
        assert_eq!(claims.user_role, Role::Normal);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_with_wrong_secret_is_unauthorized() {
        let user = User::new("A".into(), "a@example.com".into(), "h".into(), Role::Admin);
        let token = generate_jwt(&user, &settings()).unwrap();

        let mut other = settings();
        other.jwt_secret = "another-secret".into();
        assert!(matches!(verify_token(&token, &other), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let mut expired = settings();
        expired.token_ttl_secs = -3600;
        let user = User::new("A".into(), "a@example.com".into(), "h".into(), Role::Normal);
        let token = generate_jwt(&user, &expired).unwrap();
        assert!(matches!(verify_token(&token, &settings()), Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        let first = register(&store, &settings(), &register_request("alice@example.com"), Role::Normal)
            .await
            .unwrap();
        assert!(first.token.is_some());

        let second = register(&store, &settings(), &register_request("Alice@Example.com "), Role::Admin).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_admin_registration_has_no_token() {
        let store = MemoryStore::new();
        let response = register(&store, &settings(), &register_request("bob@example.com"), Role::Admin)
            .await
            .unwrap();
        assert!(response.token.is_none());
        assert_eq!(response.user.user_role, Role::Admin);
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let store = MemoryStore::new();
        register(&store, &settings(), &register_request("alice@example.com"), Role::Normal)
            .await
            .unwrap();
        register(&store, &settings(), &register_request("bob@example.com"), Role::Admin)
            .await
            .unwrap();

        let ok = login(&store, &settings(), &login_request("alice@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(ok.user.user_role, Role::Normal);

        let unknown = login(&store, &settings(), &login_request("nobody@example.com", "password123")).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let bad = login(&store, &settings(), &login_request("alice@example.com", "wrong-password")).await;
        assert!(matches!(bad, Err(AppError::Unauthorized(_))));

        let inactive = login(&store, &settings(), &login_request("bob@example.com", "password123")).await;
        assert!(matches!(inactive, Err(AppError::Forbidden(_))));

        // A wrong password on an inactive admin is still a credential failure
        let inactive_bad = login(&store, &settings(), &login_request("bob@example.com", "nope-nope")).await;
        assert!(matches!(inactive_bad, Err(AppError::Unauthorized(_))));
    }
}
