use crate::{
    config::AdminSeed,
    error::AppError,
    models::{NewUser, Role},
    password::hash_password,
    repository::CredentialStore,
};

/// AdminSeedOutcome
///
/// What `ensure_admin` did, for the startup log and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSeedOutcome {
    AlreadyPresent,
    Promoted(i64),
    Created(i64),
}

/// ensure_admin
///
/// Guarantees at least one Administrator exists. An existing account with the
/// seed username is promoted rather than duplicated.
pub async fn ensure_admin(
    users: &dyn CredentialStore,
    seed: &AdminSeed,
) -> Result<AdminSeedOutcome, AppError> {
    if users.admin_exists().await? {
        tracing::info!("administrator already present, skipping seed");
        return Ok(AdminSeedOutcome::AlreadyPresent);
    }

    if let Some(existing) = users.user_by_username(&seed.username).await? {
        users.set_role(existing.id, Role::Administrator).await?;
        tracing::info!(user_id = existing.id, username = %seed.username, "promoted existing user to administrator");
        return Ok(AdminSeedOutcome::Promoted(existing.id));
    }

    let created = users
        .create_user(NewUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash: hash_password(&seed.password)?,
            role: Role::Administrator,
        })
        .await?;
    tracing::info!(user_id = created.id, username = %created.username, "administrator account created");
    Ok(AdminSeedOutcome::Created(created.id))
}
