use std::sync::Arc;

use tracing::info;

use picfest_db::Database;
use picfest_platform::{Platform, PlatformError};
use picfest_types::models::Role;

use crate::config::AdminAccount;

/// Make sure the configured account exists and is an admin. Admins can't
/// register themselves, so a fresh local install needs this to get in.
pub async fn ensure_admin(platform: &Platform, db: &Arc<Database>, account: &AdminAccount) -> anyhow::Result<()> {
    match platform
        .auth
        .sign_up(&account.email, &account.password, "Admin", Role::Admin)
        .await
    {
        Ok(signup) => {
            info!("Created admin account {} ({})", account.email, signup.user.id);
            Ok(())
        }
        Err(PlatformError::Conflict(_)) => {
            let db = db.clone();
            let email = account.email.clone();
            let promoted = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
                match db.get_auth_user_by_email(&email)? {
                    Some(user) => db.set_profile_role(&user.id, Role::Admin),
                    None => Ok(false),
                }
            })
            .await??;
            if promoted {
                info!("Account {} holds the admin role", account.email);
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Admin bootstrap failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn promotes_an_existing_account() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let storage = std::env::temp_dir().join("picfest-bootstrap-unused");
        let platform = picfest_platform::local::platform(
            db.clone(),
            "secret".into(),
            storage,
            "http://localhost:3000/files",
        );
        let signup = platform
            .auth
            .sign_up("boss@picfest.com", "segredo123", "Boss", Role::Organizer)
            .await
            .unwrap();

        let account = AdminAccount {
            email: "boss@picfest.com".into(),
            password: "segredo123".into(),
        };
        ensure_admin(&platform, &db, &account).await.unwrap();
        // Second run is a no-op
        ensure_admin(&platform, &db, &account).await.unwrap();

        let profile = platform.store.profile(signup.user.id).await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Admin);
    }
}
