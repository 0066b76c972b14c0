use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use picfest_types::models::{AuthUser, Role, Session};

use super::SupabaseClient;
use crate::{AuthProvider, PlatformError, PlatformResult, SignUp};

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        Session {
            access_token: self.access_token,
            user: self.user.into(),
            expires_at,
        }
    }
}

/// Sign-up answers with a session, or with the bare user when the project
/// requires email confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(GoTrueUser),
}

pub struct SupabaseAuth {
    client: Arc<SupabaseClient>,
}

impl SupabaseAuth {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> PlatformResult<SignUp> {
        let email = email.trim();
        let body = json!({
            "email": email,
            "password": password,
            "data": { "nome": name, "role": role },
        });
        let resp: SignUpResponse = SupabaseClient::json(
            self.client.request(Method::POST, "/auth/v1/signup").json(&body),
            "sign up",
        )
        .await?;

        let (user, session) = match resp {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                (session.user.clone(), Some(session))
            }
            SignUpResponse::User(user) => (AuthUser::from(user), None),
        };

        // Profile row keyed by the auth user id.
        let profile = json!({
            "id": user.id,
            "email": email,
            "nome": name,
            "role": role,
        });
        let resp = self
            .client
            .table(Method::POST, "profiles")
            .json(&profile)
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "create profile").await?;

        info!(
            "Registered {} as {}{}",
            email,
            role,
            if session.is_none() { " (awaiting confirmation)" } else { "" }
        );
        Ok(SignUp { user, session })
    }

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<Session> {
        let body = json!({ "email": email.trim(), "password": password });
        let token: TokenResponse = SupabaseClient::json(
            self.client
                .request(Method::POST, "/auth/v1/token")
                .query(&[("grant_type", "password")])
                .json(&body),
            "sign in",
        )
        .await?;
        Ok(token.into_session())
    }

    async fn sign_out(&self, token: &str) -> PlatformResult<()> {
        let resp = self
            .client
            .request_as(Method::POST, "/auth/v1/logout", token)
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "sign out").await?;
        Ok(())
    }

    async fn session(&self, token: &str) -> PlatformResult<Option<AuthUser>> {
        let resp = self
            .client
            .request_as(Method::GET, "/auth/v1/user", token)
            .send()
            .await?;
        match SupabaseClient::ensure_success(resp, "resolve session").await {
            Ok(resp) => Ok(Some(resp.json::<GoTrueUser>().await?.into())),
            Err(PlatformError::Unauthorized | PlatformError::Forbidden) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn reset_password(&self, email: &str) -> PlatformResult<()> {
        let resp = self
            .client
            .request(Method::POST, "/auth/v1/recover")
            .json(&json!({ "email": email.trim() }))
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "password recovery").await?;
        Ok(())
    }

    async fn update_password(&self, token: &str, new_password: &str) -> PlatformResult<()> {
        let resp = self
            .client
            .request_as(Method::PUT, "/auth/v1/user", token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "update password").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_without_session_needs_confirmation() {
        let raw = r#"{"id":"7f4c8a34-6f2e-4b71-9a1c-5d3c1a2b9e10","email":"a@b.com","confirmation_sent_at":"2024-05-01T12:00:00Z"}"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(raw).unwrap(),
            SignUpResponse::User(_)
        ));

        let raw = r#"{
            "access_token":"tok","token_type":"bearer","expires_in":3600,"expires_at":1714564800,
            "refresh_token":"r","user":{"id":"7f4c8a34-6f2e-4b71-9a1c-5d3c1a2b9e10","email":"a@b.com"}
        }"#;
        match serde_json::from_str::<SignUpResponse>(raw).unwrap() {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                assert_eq!(session.access_token, "tok");
                assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1714564800));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
