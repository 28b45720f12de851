use crate::config::{AuthSettings, SuperAdminSeed};
use crate::database::{self, RecordStore, Table};
use crate::models::{Role, User};
use crate::services::auth_service;
use crate::utils::AppError;

/// Creates the configured super admin if no account uses its email yet.
/// No public route can create a super, so this is the only way one comes to exist.
pub async fn seed_super_admin(
    store: &dyn RecordStore,
    settings: &AuthSettings,
    seed: &SuperAdminSeed,
) -> Result<(), AppError> {
    if let Some(existing) = auth_service::find_by_email(store, &seed.email).await? {
        if existing.user_role == Role::Super {
            log::info!("👑 Super admin {} already exists, skipping seed", existing.user_email);
        } else {
            log::warn!(
                "⚠️  {} is registered with role '{}', super admin not seeded",
                existing.user_email,
                existing.user_role
            );
        }
        return Ok(());
    }

    let password_hash = auth_service::hash_password(&seed.password, settings.bcrypt_cost).await?;
    let user = User::new(
        seed.name.clone(),
        auth_service::normalize_email(&seed.email),
        password_hash,
        Role::Super,
    );

    database::save(store, Table::Users, &user).await?;
    log::info!("👑 Super admin seeded: {}", user.user_email);
    Ok(())
}
