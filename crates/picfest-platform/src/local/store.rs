use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use picfest_db::Database;
use picfest_types::events::MediaChange;
use picfest_types::models::{
    ConfigEntry, Event, EventStatus, GuestProfileInput, Media, NewEvent, NewMedia, NewTestimonial,
    Plan, PlanDraft, PlatformMetrics, Profile, ProfileUpdate, Role, Subscription,
    SubscriptionStatus, Testimonial,
};

use super::blocking;
use super::dispatcher::Dispatcher;
use crate::{PlatformError, PlatformResult, Store};

/// Table access over the SQLite database. Media writes are published on
/// the dispatcher the way the hosted change feed would report them.
pub struct LocalStore {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl LocalStore {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    async fn run<F, T>(&self, f: F) -> PlatformResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        blocking(&self.db, f).await
    }

    async fn fetch_media(&self, id: Uuid) -> PlatformResult<Option<Media>> {
        let id = id.to_string();
        Ok(self.run(move |db| db.get_media(&id)).await?.map(Media::from))
    }

    async fn fetch_event(&self, id: Uuid) -> PlatformResult<Option<Event>> {
        let id = id.to_string();
        Ok(self.run(move |db| db.get_event(&id)).await?.map(Event::from))
    }
}

fn found(updated: bool) -> PlatformResult<()> {
    if updated { Ok(()) } else { Err(PlatformError::NotFound) }
}

#[async_trait]
impl Store for LocalStore {
    // -- Profiles --

    async fn profile(&self, id: Uuid) -> PlatformResult<Option<Profile>> {
        let id = id.to_string();
        Ok(self.run(move |db| db.get_profile(&id)).await?.map(Profile::from))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> PlatformResult<Profile> {
        let (key, update) = (id.to_string(), update.clone());
        let row = self
            .run(move |db| {
                if !db.update_profile(&key, &update)? {
                    return Ok(None);
                }
                db.get_profile(&key)
            })
            .await?;
        row.map(Profile::from).ok_or(PlatformError::NotFound)
    }

    async fn list_profiles(&self) -> PlatformResult<Vec<Profile>> {
        let rows = self.run(|db| db.list_profiles()).await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> PlatformResult<()> {
        let id = id.to_string();
        found(self.run(move |db| db.set_profile_role(&id, role)).await?)
    }

    async fn get_or_create_guest(&self, guest: &GuestProfileInput) -> PlatformResult<Profile> {
        let guest = GuestProfileInput {
            name: guest.name.trim().to_string(),
            email: guest.email.trim().to_string(),
            phone: guest.phone.clone().filter(|p| !p.trim().is_empty()),
            instagram: guest.instagram.clone().filter(|i| !i.trim().is_empty()),
        };
        if guest.name.is_empty() || guest.email.is_empty() {
            return Err(PlatformError::Invalid("Name and email are required".into()));
        }
        let new_id = Uuid::new_v4().to_string();
        let (row, created) = self
            .run(move |db| db.get_or_create_guest_profile(&new_id, &guest))
            .await?;
        if created {
            info!("Created guest profile {}", row.id);
        }
        Ok(Profile::from(row))
    }

    async fn set_profile_photo(&self, id: Uuid, url: &str) -> PlatformResult<()> {
        let (id, url) = (id.to_string(), url.to_string());
        found(self.run(move |db| db.set_profile_photo(&id, &url)).await?)
    }

    // -- Events --

    async fn create_event(&self, event: &NewEvent) -> PlatformResult<Event> {
        let id = Uuid::new_v4();
        let (key, event) = (id.to_string(), event.clone());
        self.run(move |db| db.insert_event(&key, &event)).await?;
        self.fetch_event(id).await?.ok_or(PlatformError::NotFound)
    }

    async fn event_by_slug(&self, slug: &str) -> PlatformResult<Option<Event>> {
        let slug = slug.to_string();
        Ok(self.run(move |db| db.get_event_by_slug(&slug)).await?.map(Event::from))
    }

    async fn event_by_id(&self, id: Uuid) -> PlatformResult<Option<Event>> {
        self.fetch_event(id).await
    }

    async fn events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<Vec<Event>> {
        let org = organizer_id.to_string();
        let rows = self.run(move |db| db.list_events_by_organizer(&org)).await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn all_events(&self) -> PlatformResult<Vec<Event>> {
        let rows = self.run(|db| db.list_events()).await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> PlatformResult<Event> {
        let key = id.to_string();
        found(self.run(move |db| db.set_event_status(&key, status.as_str())).await?)?;
        self.fetch_event(id).await?.ok_or(PlatformError::NotFound)
    }

    async fn count_events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<i64> {
        let org = organizer_id.to_string();
        self.run(move |db| db.count_events(Some(&org))).await
    }

    // -- Media --

    async fn insert_media(&self, media: &NewMedia) -> PlatformResult<Media> {
        let id = Uuid::new_v4();
        let (key, new) = (id.to_string(), media.clone());
        self.run(move |db| db.insert_media(&key, &new)).await?;

        let stored = self.fetch_media(id).await?.ok_or(PlatformError::NotFound)?;
        self.dispatcher
            .publish(stored.event_id, MediaChange::Insert(stored.clone()))
            .await;
        Ok(stored)
    }

    async fn media_by_event(&self, event_id: Uuid, approved_only: bool) -> PlatformResult<Vec<Media>> {
        let event = event_id.to_string();
        let rows = self
            .run(move |db| db.list_media_by_event(&event, approved_only))
            .await?;
        Ok(rows.into_iter().map(Media::from).collect())
    }

    async fn media(&self, id: Uuid) -> PlatformResult<Option<Media>> {
        self.fetch_media(id).await
    }

    async fn set_media_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Media> {
        let key = id.to_string();
        found(self.run(move |db| db.set_media_approval(&key, approved)).await?)?;

        let stored = self.fetch_media(id).await?.ok_or(PlatformError::NotFound)?;
        self.dispatcher
            .publish(stored.event_id, MediaChange::Update(stored.clone()))
            .await;
        Ok(stored)
    }

    async fn delete_media(&self, id: Uuid) -> PlatformResult<()> {
        let existing = self.fetch_media(id).await?.ok_or(PlatformError::NotFound)?;
        let key = id.to_string();
        found(self.run(move |db| db.delete_media(&key)).await?)?;
        self.dispatcher
            .publish(existing.event_id, MediaChange::Delete { id })
            .await;
        Ok(())
    }

    async fn count_media_by_event(&self, event_id: Uuid) -> PlatformResult<i64> {
        let event = event_id.to_string();
        self.run(move |db| db.count_media(Some(&event))).await
    }

    // -- Plans --

    async fn plans(&self, include_inactive: bool) -> PlatformResult<Vec<Plan>> {
        let rows = self.run(move |db| db.list_plans(include_inactive)).await?;
        Ok(rows.into_iter().map(Plan::from).collect())
    }

    async fn create_plan(&self, draft: &PlanDraft) -> PlatformResult<Plan> {
        let key = Uuid::new_v4().to_string();
        let draft = draft.clone();
        let row = self
            .run(move |db| {
                db.insert_plan(&key, &draft)?;
                db.get_plan(&key)
            })
            .await?;
        row.map(Plan::from).ok_or(PlatformError::NotFound)
    }

    async fn update_plan(&self, id: Uuid, draft: &PlanDraft) -> PlatformResult<Plan> {
        let (key, draft) = (id.to_string(), draft.clone());
        let row = self
            .run(move |db| {
                if !db.update_plan(&key, &draft)? {
                    return Ok(None);
                }
                db.get_plan(&key)
            })
            .await?;
        row.map(Plan::from).ok_or(PlatformError::NotFound)
    }

    async fn delete_plan(&self, id: Uuid) -> PlatformResult<()> {
        let key = id.to_string();
        found(self.run(move |db| db.delete_plan(&key)).await?)
    }

    // -- Subscriptions --

    async fn active_subscription_for(
        &self,
        organizer_id: Uuid,
    ) -> PlatformResult<Option<Subscription>> {
        let org = organizer_id.to_string();
        Ok(self
            .run(move |db| db.latest_subscription(&org, true))
            .await?
            .map(Subscription::from))
    }

    async fn upsert_subscription(
        &self,
        organizer_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> PlatformResult<Subscription> {
        let new_id = Uuid::new_v4().to_string();
        let (org, plan) = (organizer_id.to_string(), plan_id.to_string());
        let expires = expires_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
        let row = self
            .run(move |db| {
                db.upsert_subscription(&new_id, &org, &plan, status.as_str(), expires.as_deref())
            })
            .await?;
        Ok(Subscription::from(row))
    }

    // -- Testimonials --

    async fn testimonials(&self, approved_only: bool) -> PlatformResult<Vec<Testimonial>> {
        let rows = self.run(move |db| db.list_testimonials(approved_only)).await?;
        Ok(rows.into_iter().map(Testimonial::from).collect())
    }

    async fn create_testimonial(&self, testimonial: &NewTestimonial) -> PlatformResult<Testimonial> {
        let key = Uuid::new_v4().to_string();
        let new = testimonial.clone();
        let row = self
            .run(move |db| {
                db.insert_testimonial(&key, &new)?;
                db.get_testimonial(&key)
            })
            .await?;
        row.map(Testimonial::from).ok_or(PlatformError::NotFound)
    }

    async fn set_testimonial_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Testimonial> {
        let key = id.to_string();
        let row = self
            .run(move |db| {
                if !db.set_testimonial_approval(&key, approved)? {
                    return Ok(None);
                }
                db.get_testimonial(&key)
            })
            .await?;
        row.map(Testimonial::from).ok_or(PlatformError::NotFound)
    }

    // -- General configuration --

    async fn config(&self, id: &str) -> PlatformResult<Option<ConfigEntry>> {
        let id = id.to_string();
        Ok(self.run(move |db| db.get_config(&id)).await?.map(ConfigEntry::from))
    }

    async fn upsert_config(&self, id: &str, content: &Value) -> PlatformResult<ConfigEntry> {
        let (id, content) = (id.to_string(), content.clone());
        let row = self
            .run(move |db| {
                db.upsert_config(&id, &content)?;
                db.get_config(&id)
            })
            .await?;
        row.map(ConfigEntry::from).ok_or(PlatformError::NotFound)
    }

    async fn metrics(&self) -> PlatformResult<PlatformMetrics> {
        self.run(|db| {
            let (active_subscriptions, revenue) = db.active_subscription_revenue()?;
            Ok(PlatformMetrics {
                total_users: db.count_profiles_by_role(Role::Organizer)?,
                total_events: db.count_events(None)?,
                total_media: db.count_media(None)?,
                revenue,
                active_subscriptions,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeFeed;
    use picfest_types::models::MediaKind;

    async fn store_with_event() -> (LocalStore, Dispatcher, Event) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let org = Uuid::new_v4();
        db.create_account(&org.to_string(), "org@test.com", "x", Role::Organizer, "Org")
            .unwrap();

        let dispatcher = Dispatcher::new();
        let store = LocalStore::new(db, dispatcher.clone());
        let event = store
            .create_event(&NewEvent {
                name: "Festa".into(),
                slug: "FESTA1".into(),
                date: None,
                organizer_id: org,
                config: Default::default(),
            })
            .await
            .unwrap();
        (store, dispatcher, event)
    }

    #[tokio::test]
    async fn guest_profile_is_reused_by_email() {
        let (store, _, _) = store_with_event().await;
        let input = GuestProfileInput {
            name: "Lia".into(),
            email: "lia@test.com".into(),
            phone: Some("".into()),
            instagram: None,
        };
        let first = store.get_or_create_guest(&input).await.unwrap();
        let second = store.get_or_create_guest(&input).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Guest);
        assert!(first.phone.is_none());
    }

    #[tokio::test]
    async fn media_writes_reach_the_feed() {
        let (store, dispatcher, event) = store_with_event().await;
        let mut sub = dispatcher.subscribe_media(event.id).await.unwrap();

        let guest = store
            .get_or_create_guest(&GuestProfileInput {
                name: "Lia".into(),
                email: "lia@test.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let media = store
            .insert_media(&NewMedia {
                event_id: event.id,
                uploader_id: guest.id,
                kind: MediaKind::Photo,
                caption: None,
                url: "http://localhost/files/a.jpg".into(),
                approved: false,
            })
            .await
            .unwrap();

        match sub.recv().await {
            Some(MediaChange::Insert(m)) => {
                assert_eq!(m.id, media.id);
                assert_eq!(m.profile.map(|p| p.name), Some("Lia".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }

        store.set_media_approval(media.id, true).await.unwrap();
        assert!(matches!(sub.recv().await, Some(MediaChange::Update(m)) if m.approved));

        store.delete_media(media.id).await.unwrap();
        assert_eq!(sub.recv().await, Some(MediaChange::Delete { id: media.id }));
        assert!(store.media(media.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let (store, _, event) = store_with_event().await;
        let err = store
            .create_event(&NewEvent {
                name: "Outra".into(),
                slug: event.slug.clone(),
                date: None,
                organizer_id: event.organizer_id,
                config: Default::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
    }

    #[tokio::test]
    async fn metrics_count_organizers_and_revenue() {
        let (store, _, event) = store_with_event().await;
        let plan = store.plans(false).await.unwrap().remove(0);
        store
            .upsert_subscription(event.organizer_id, plan.id, SubscriptionStatus::Active, None)
            .await
            .unwrap();

        let metrics = store.metrics().await.unwrap();
        assert_eq!(metrics.total_users, 1);
        assert_eq!(metrics.total_events, 1);
        assert_eq!(metrics.active_subscriptions, 1);
        assert_eq!(metrics.revenue, plan.price);
    }
}
