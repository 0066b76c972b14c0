use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use picfest_db::Database;
use picfest_types::models::{AuthUser, Role, Session};

use crate::{AuthProvider, PlatformError, PlatformResult, SignUp};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    /// Token id, recorded on sign-out so the token stops working.
    jti: Uuid,
    exp: usize,
}

/// Email/password accounts stored next to the profiles, argon2 hashes and
/// HS256 tokens.
pub struct LocalAuth {
    db: Arc<Database>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl LocalAuth {
    pub fn new(db: Arc<Database>, jwt_secret: String) -> Self {
        Self {
            db,
            jwt_secret,
            token_ttl: Duration::days(30),
        }
    }

    fn issue(&self, user: AuthUser) -> PlatformResult<Session> {
        let expires_at = Utc::now() + self.token_ttl;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4(),
            exp: expires_at.timestamp() as usize,
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| PlatformError::Internal(e.into()))?;

        Ok(Session {
            access_token,
            user,
            expires_at: Some(expires_at),
        })
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .ok()
    }

    async fn blocking<F, T>(&self, f: F) -> PlatformResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        super::blocking(&self.db, f).await
    }

    /// Claims of a live token: signature, expiry and revocation checked.
    async fn live_claims(&self, token: &str) -> PlatformResult<Option<Claims>> {
        let Some(claims) = self.decode(token) else {
            return Ok(None);
        };
        let jti = claims.jti.to_string();
        let revoked = self.blocking(move |db| db.is_token_revoked(&jti)).await?;
        Ok((!revoked).then_some(claims))
    }
}

fn hash_password(password: &str) -> PlatformResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PlatformError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

fn check_password(password: &str) -> PlatformResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(PlatformError::Invalid(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> PlatformResult<SignUp> {
        check_password(password)?;
        let password_hash = hash_password(password)?;

        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.trim().to_string(),
        };
        let lookup = user.email.clone();
        if self
            .blocking(move |db| db.get_auth_user_by_email(&lookup))
            .await?
            .is_some()
        {
            return Err(PlatformError::Conflict("User already registered".into()));
        }

        let (id, email, name) = (user.id.to_string(), user.email.clone(), name.to_string());
        self.blocking(move |db| db.create_account(&id, &email, &password_hash, role, &name))
            .await?;

        info!("Registered {} as {}", user.email, role);
        let session = self.issue(user.clone())?;
        Ok(SignUp {
            user,
            session: Some(session),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<Session> {
        let lookup = email.trim().to_string();
        let row = self
            .blocking(move |db| db.get_auth_user_by_email(&lookup))
            .await?
            .ok_or(PlatformError::Unauthorized)?;

        let parsed = PasswordHash::new(&row.password)
            .map_err(|e| PlatformError::Internal(anyhow::anyhow!("Stored hash unreadable: {}", e)))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| PlatformError::Unauthorized)?;

        let id = row.id.parse().map_err(|e| {
            warn!("Corrupt auth user id '{}': {}", row.id, e);
            PlatformError::Internal(anyhow::anyhow!("Corrupt user id"))
        })?;
        self.issue(AuthUser {
            id,
            email: row.email,
        })
    }

    async fn sign_out(&self, token: &str) -> PlatformResult<()> {
        let Some(claims) = self.decode(token) else {
            return Err(PlatformError::Unauthorized);
        };
        let now = Utc::now().timestamp();
        let jti = claims.jti.to_string();
        self.blocking(move |db| db.revoke_token(&jti, claims.exp as i64, now))
            .await
    }

    async fn session(&self, token: &str) -> PlatformResult<Option<AuthUser>> {
        Ok(self.live_claims(token).await?.map(|c| AuthUser {
            id: c.sub,
            email: c.email,
        }))
    }

    async fn reset_password(&self, email: &str) -> PlatformResult<()> {
        // No mail delivery offline; answer the same way either way.
        info!("Password reset requested for {}", email.trim());
        Ok(())
    }

    async fn update_password(&self, token: &str, new_password: &str) -> PlatformResult<()> {
        check_password(new_password)?;
        let claims = self
            .live_claims(token)
            .await?
            .ok_or(PlatformError::Unauthorized)?;
        let password_hash = hash_password(new_password)?;
        let id = claims.sub.to_string();
        let updated = self
            .blocking(move |db| db.update_auth_password(&id, &password_hash))
            .await?;
        if !updated {
            return Err(PlatformError::NotFound);
        }
        Ok(())
    }
}
