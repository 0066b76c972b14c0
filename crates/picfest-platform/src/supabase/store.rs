use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use picfest_types::models::{
    ConfigEntry, Event, EventStatus, GuestProfileInput, Media, NewEvent, NewMedia, NewTestimonial,
    Plan, PlanDraft, PlatformMetrics, Profile, ProfileUpdate, Role, Subscription,
    SubscriptionStatus, Testimonial,
};

use super::SupabaseClient;
use crate::{PlatformError, PlatformResult, Store};

const MEDIA_SELECT: &str = "*,perfil:profiles(*)";
const SUBSCRIPTION_SELECT: &str = "*,planos(*)";

type Query = Vec<(&'static str, String)>;

fn eq(value: impl Display) -> String {
    format!("eq.{}", value)
}

/// `0-24/3573` or `*/0` -> total.
fn parse_content_range(header: &str) -> Option<i64> {
    header.rsplit('/').next()?.parse().ok()
}

pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> PlatformResult<Vec<T>> {
        SupabaseClient::json(
            self.client.table(Method::GET, table).query(&query),
            &format!("select {}", table),
        )
        .await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        mut query: Query,
    ) -> PlatformResult<Option<T>> {
        query.push(("limit", "1".into()));
        Ok(self.select(table, query).await?.into_iter().next())
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl serde::Serialize,
        select: Option<&str>,
    ) -> PlatformResult<T> {
        let mut req = self.client.table(Method::POST, table).json(body);
        if let Some(select) = select {
            req = req.query(&[("select", select)]);
        }
        SupabaseClient::single(req, &format!("insert {}", table)).await
    }

    /// PATCH rows matching `id`. `NotFound` when nothing matched.
    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        id: impl Display,
        body: &impl serde::Serialize,
        select: Option<&str>,
    ) -> PlatformResult<T> {
        let mut query: Query = vec![("id", eq(id))];
        if let Some(select) = select {
            query.push(("select", select.to_string()));
        }
        SupabaseClient::single(
            self.client.table(Method::PATCH, table).query(&query).json(body),
            &format!("update {}", table),
        )
        .await
    }

    async fn delete(&self, table: &str, id: impl Display) -> PlatformResult<()> {
        let rows: Vec<Value> = SupabaseClient::json(
            self.client
                .table(Method::DELETE, table)
                .query(&[("id", eq(id))]),
            &format!("delete {}", table),
        )
        .await?;
        if rows.is_empty() {
            return Err(PlatformError::NotFound);
        }
        Ok(())
    }

    async fn count(&self, table: &str, query: Query) -> PlatformResult<i64> {
        let resp = self
            .client
            .request(Method::HEAD, &format!("/rest/v1/{}", table))
            .header("Prefer", "count=exact")
            .query(&query)
            .send()
            .await?;
        let resp = SupabaseClient::ensure_success(resp, &format!("count {}", table)).await?;
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| PlatformError::Backend(format!("count {}: missing Content-Range", table)))
    }

    /// Database function exposed under `/rest/v1/rpc`. Guest profiles and
    /// profile photos are written through these instead of the tables.
    fn rpc(&self, function: &str) -> reqwest::RequestBuilder {
        self.client
            .request(Method::POST, &format!("/rest/v1/rpc/{}", function))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    async fn latest_subscription(
        &self,
        organizer_id: Uuid,
        active_only: bool,
    ) -> PlatformResult<Option<Subscription>> {
        let mut query: Query = vec![
            ("select", SUBSCRIPTION_SELECT.into()),
            ("organizador_id", eq(organizer_id)),
            ("order", "created_at.desc".into()),
        ];
        if active_only {
            query.push(("status", eq(SubscriptionStatus::Active.as_str())));
        }
        self.select_one("assinaturas", query).await
    }
}

#[async_trait]
impl Store for SupabaseStore {
    // -- Profiles --

    async fn profile(&self, id: Uuid) -> PlatformResult<Option<Profile>> {
        self.select_one("profiles", vec![("id", eq(id))]).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> PlatformResult<Profile> {
        if update.is_empty() {
            return self.profile(id).await?.ok_or(PlatformError::NotFound);
        }
        self.update("profiles", id, update, None).await
    }

    async fn list_profiles(&self) -> PlatformResult<Vec<Profile>> {
        self.select("profiles", vec![("order", "created_at.desc".into())])
            .await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> PlatformResult<()> {
        self.update::<Profile>("profiles", id, &json!({ "role": role }), None)
            .await
            .map(|_| ())
    }

    async fn get_or_create_guest(&self, guest: &GuestProfileInput) -> PlatformResult<Profile> {
        let name = guest.name.trim();
        let email = guest.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(PlatformError::Invalid("Name and email are required".into()));
        }
        let args = json!({
            "p_nome": name,
            "p_email": email,
            "p_telefone": guest.phone.as_deref().filter(|p| !p.trim().is_empty()),
            "p_instagram": guest.instagram.as_deref().filter(|i| !i.trim().is_empty()),
        });
        let profile: Profile = SupabaseClient::json(
            self.rpc("get_or_create_guest_profile").json(&args),
            "get_or_create_guest_profile",
        )
        .await?;
        debug!("Guest profile {} for {}", profile.id, email);
        Ok(profile)
    }

    async fn set_profile_photo(&self, id: Uuid, url: &str) -> PlatformResult<()> {
        let resp = self
            .rpc("update_profile_photo")
            .json(&json!({ "p_user_id": id, "p_foto_url": url }))
            .send()
            .await?;
        SupabaseClient::ensure_success(resp, "update_profile_photo").await?;
        Ok(())
    }

    // -- Events --

    async fn create_event(&self, event: &NewEvent) -> PlatformResult<Event> {
        self.insert("eventos", event, None).await
    }

    async fn event_by_slug(&self, slug: &str) -> PlatformResult<Option<Event>> {
        self.select_one("eventos", vec![("slug_curto", eq(slug))]).await
    }

    async fn event_by_id(&self, id: Uuid) -> PlatformResult<Option<Event>> {
        self.select_one("eventos", vec![("id", eq(id))]).await
    }

    async fn events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<Vec<Event>> {
        self.select(
            "eventos",
            vec![
                ("organizador_id", eq(organizer_id)),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }

    async fn all_events(&self) -> PlatformResult<Vec<Event>> {
        self.select("eventos", vec![("order", "created_at.desc".into())])
            .await
    }

    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> PlatformResult<Event> {
        self.update("eventos", id, &json!({ "status": status }), None)
            .await
    }

    async fn count_events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<i64> {
        self.count("eventos", vec![("organizador_id", eq(organizer_id))])
            .await
    }

    // -- Media --

    async fn insert_media(&self, media: &NewMedia) -> PlatformResult<Media> {
        self.insert("midias", media, Some(MEDIA_SELECT)).await
    }

    async fn media_by_event(&self, event_id: Uuid, approved_only: bool) -> PlatformResult<Vec<Media>> {
        let mut query: Query = vec![
            ("select", MEDIA_SELECT.into()),
            ("evento_id", eq(event_id)),
            ("order", "created_at.desc".into()),
        ];
        if approved_only {
            query.push(("aprovado", eq(true)));
        }
        self.select("midias", query).await
    }

    async fn media(&self, id: Uuid) -> PlatformResult<Option<Media>> {
        self.select_one("midias", vec![("select", MEDIA_SELECT.into()), ("id", eq(id))])
            .await
    }

    async fn set_media_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Media> {
        self.update("midias", id, &json!({ "aprovado": approved }), Some(MEDIA_SELECT))
            .await
    }

    async fn delete_media(&self, id: Uuid) -> PlatformResult<()> {
        self.delete("midias", id).await
    }

    async fn count_media_by_event(&self, event_id: Uuid) -> PlatformResult<i64> {
        self.count("midias", vec![("evento_id", eq(event_id))]).await
    }

    // -- Plans --

    async fn plans(&self, include_inactive: bool) -> PlatformResult<Vec<Plan>> {
        let mut query: Query = vec![("order", "valor.asc".into())];
        if !include_inactive {
            query.push(("ativo", eq(true)));
        }
        self.select("planos", query).await
    }

    async fn create_plan(&self, draft: &PlanDraft) -> PlatformResult<Plan> {
        self.insert("planos", draft, None).await
    }

    async fn update_plan(&self, id: Uuid, draft: &PlanDraft) -> PlatformResult<Plan> {
        self.update("planos", id, draft, None).await
    }

    async fn delete_plan(&self, id: Uuid) -> PlatformResult<()> {
        self.delete("planos", id).await
    }

    // -- Subscriptions --

    async fn active_subscription_for(
        &self,
        organizer_id: Uuid,
    ) -> PlatformResult<Option<Subscription>> {
        self.latest_subscription(organizer_id, true).await
    }

    async fn upsert_subscription(
        &self,
        organizer_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> PlatformResult<Subscription> {
        let body = json!({
            "organizador_id": organizer_id,
            "plano_id": plan_id,
            "status": status,
            "expira_em": expires_at,
        });
        match self.latest_subscription(organizer_id, false).await? {
            Some(existing) => {
                self.update("assinaturas", existing.id, &body, Some(SUBSCRIPTION_SELECT))
                    .await
            }
            None => {
                self.insert("assinaturas", &body, Some(SUBSCRIPTION_SELECT))
                    .await
            }
        }
    }

    // -- Testimonials --

    async fn testimonials(&self, approved_only: bool) -> PlatformResult<Vec<Testimonial>> {
        let mut query: Query = vec![("order", "created_at.desc".into())];
        if approved_only {
            query.push(("aprovado", eq(true)));
        }
        self.select("depoimentos", query).await
    }

    async fn create_testimonial(&self, testimonial: &NewTestimonial) -> PlatformResult<Testimonial> {
        self.insert("depoimentos", testimonial, None).await
    }

    async fn set_testimonial_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Testimonial> {
        self.update("depoimentos", id, &json!({ "aprovado": approved }), None)
            .await
    }

    // -- General configuration --

    async fn config(&self, id: &str) -> PlatformResult<Option<ConfigEntry>> {
        self.select_one("configuracao_geral", vec![("id", eq(id))])
            .await
    }

    async fn upsert_config(&self, id: &str, content: &Value) -> PlatformResult<ConfigEntry> {
        let body = json!({ "id": id, "conteudo": content, "updated_at": Utc::now() });
        SupabaseClient::single(
            self.client
                .table(Method::POST, "configuracao_geral")
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(&body),
            "upsert configuracao_geral",
        )
        .await
    }

    async fn metrics(&self) -> PlatformResult<PlatformMetrics> {
        #[derive(Deserialize)]
        struct PlanPrice {
            valor: f64,
        }
        #[derive(Deserialize)]
        struct ActiveSubscription {
            planos: Option<PlanPrice>,
        }

        let total_users = self
            .count("profiles", vec![("role", eq(Role::Organizer.as_str()))])
            .await?;
        let total_events = self.count("eventos", Vec::new()).await?;
        let total_media = self.count("midias", Vec::new()).await?;
        let active: Vec<ActiveSubscription> = self
            .select(
                "assinaturas",
                vec![
                    ("select", "planos(valor)".into()),
                    ("status", eq(SubscriptionStatus::Active.as_str())),
                ],
            )
            .await?;

        Ok(PlatformMetrics {
            total_users,
            total_events,
            total_media,
            revenue: active.iter().filter_map(|s| s.planos.as_ref()).map(|p| p.valor).sum(),
            active_subscriptions: active.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-24/*"), None);
    }

    #[test]
    fn media_row_with_joined_profile() {
        let raw = r#"[{
            "id":"0b7f7e1c-3e0b-4f7d-8a8e-8d6a1c2b3d4e",
            "evento_id":"1c7f7e1c-3e0b-4f7d-8a8e-8d6a1c2b3d4e",
            "usuario_id":"2d7f7e1c-3e0b-4f7d-8a8e-8d6a1c2b3d4e",
            "tipo":"foto","legenda":null,"url":"https://x/a.jpg","aprovado":true,
            "created_at":"2024-05-01T12:00:00.123456+00:00",
            "perfil":{"id":"2d7f7e1c-3e0b-4f7d-8a8e-8d6a1c2b3d4e","role":"convidado","nome":"Lia",
                      "email":"lia@x.com","created_at":"2024-05-01T11:00:00+00:00"}
        }]"#;
        let rows: Vec<Media> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].profile.as_ref().map(|p| p.name.as_str()), Some("Lia"));
        assert!(rows[0].caption.is_none());
    }
}
