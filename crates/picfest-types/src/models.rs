use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// Field names on the wire follow the platform schema (profiles, eventos,
// midias, planos, assinaturas, depoimentos, configuracao_geral).

// -- Roles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "organizador")]
    Organizer,
    #[serde(rename = "convidado")]
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Organizer => "organizador",
            Self::Guest => "convidado",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "organizador" => Ok(Self::Organizer),
            "convidado" => Ok(Self::Guest),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// -- Profiles --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(rename = "endereco_logradouro", default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "endereco_numero", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "endereco_complemento", default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(rename = "endereco_bairro", default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "endereco_cidade", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "endereco_estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub role: Role,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(rename = "foto_perfil", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(rename = "data_nascimento", default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update submitted from the profile form.
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(rename = "data_nascimento", default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub address: Address,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.instagram.is_none()
            && self.cpf.is_none()
            && self.birth_date.is_none()
            && self.address == Address::default()
    }
}

/// Contact data a guest types into the first wizard step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuestProfileInput {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

// -- Events --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "encerrado")]
    Closed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ativo",
            Self::Closed => "encerrado",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ativo" => Ok(Self::Active),
            "encerrado" => Ok(Self::Closed),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

/// Free-form event configuration blob. Only the moderation toggle is
/// interpreted; every other key is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(rename = "moderacao_ativa", default)]
    pub moderation: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "slug_curto")]
    pub slug: String,
    #[serde(rename = "data_evento", default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "organizador_id")]
    pub organizer_id: Uuid,
    pub status: EventStatus,
    #[serde(rename = "config_json", default)]
    pub config: EventConfig,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_open(&self) -> bool {
        self.status == EventStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "slug_curto")]
    pub slug: String,
    #[serde(rename = "data_evento")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "organizador_id")]
    pub organizer_id: Uuid,
    #[serde(rename = "config_json")]
    pub config: EventConfig,
}

// -- Media --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "foto")]
    Photo,
    #[serde(rename = "video")]
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "foto",
            Self::Video => "video",
        }
    }

    /// Classify an upload by its MIME type. Anything that is neither an
    /// image nor a video is rejected.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        if essence.starts_with("image/") {
            Some(Self::Photo)
        } else if essence.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foto" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    #[serde(rename = "evento_id")]
    pub event_id: Uuid,
    #[serde(rename = "usuario_id")]
    pub uploader_id: Uuid,
    #[serde(rename = "tipo")]
    pub kind: MediaKind,
    #[serde(rename = "legenda", default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub url: String,
    #[serde(rename = "aprovado", default)]
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "perfil", default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedia {
    #[serde(rename = "evento_id")]
    pub event_id: Uuid,
    #[serde(rename = "usuario_id")]
    pub uploader_id: Uuid,
    #[serde(rename = "tipo")]
    pub kind: MediaKind,
    #[serde(rename = "legenda", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub url: String,
    #[serde(rename = "aprovado")]
    pub approved: bool,
}

// -- Plans & subscriptions --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    /// 0 means unlimited.
    #[serde(rename = "limite_eventos", default)]
    pub event_limit: i64,
    /// 0 means unlimited.
    #[serde(rename = "limite_midias", default)]
    pub media_limit: i64,
    #[serde(rename = "limite_storage", default)]
    pub storage_limit_gb: i64,
    #[serde(rename = "permite_download", default)]
    pub allows_download: bool,
    #[serde(rename = "valor")]
    pub price: f64,
    #[serde(rename = "recorrencia")]
    pub recurrence: String,
    #[serde(rename = "ativo", default = "default_true")]
    pub active: bool,
}

impl Plan {
    pub fn allows_another_event(&self, current: i64) -> bool {
        self.event_limit == 0 || current < self.event_limit
    }

    pub fn allows_another_media(&self, current: i64) -> bool {
        self.media_limit == 0 || current < self.media_limit
    }
}

fn default_true() -> bool {
    true
}

/// Plan fields for create (name and price required, limits default to
/// unlimited) and update (absent fields stay as they are).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanDraft {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "limite_eventos", default, skip_serializing_if = "Option::is_none")]
    pub event_limit: Option<i64>,
    #[serde(rename = "limite_midias", default, skip_serializing_if = "Option::is_none")]
    pub media_limit: Option<i64>,
    #[serde(rename = "limite_storage", default, skip_serializing_if = "Option::is_none")]
    pub storage_limit_gb: Option<i64>,
    #[serde(rename = "permite_download", default, skip_serializing_if = "Option::is_none")]
    pub allows_download: Option<bool>,
    #[serde(rename = "valor", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "recorrencia", default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(rename = "ativo", default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "cancelado")]
    Cancelled,
    #[serde(rename = "expirado")]
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ativo",
            Self::Pending => "pendente",
            Self::Cancelled => "cancelado",
            Self::Expired => "expirado",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ativo" => Ok(Self::Active),
            "pendente" => Ok(Self::Pending),
            "cancelado" => Ok(Self::Cancelled),
            "expirado" => Ok(Self::Expired),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    #[serde(rename = "organizador_id")]
    pub organizer_id: Uuid,
    #[serde(rename = "plano_id")]
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    #[serde(rename = "expira_em", default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "planos", default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl Subscription {
    /// Active and not past its expiration date.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

// -- Testimonials --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: Uuid,
    #[serde(rename = "organizador_id", default)]
    pub organizer_id: Option<Uuid>,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "foto_url", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "estrelas")]
    pub stars: u8,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "aprovado", default)]
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTestimonial {
    #[serde(rename = "organizador_id")]
    pub organizer_id: Option<Uuid>,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "foto_url", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "estrelas")]
    pub stars: u8,
    #[serde(rename = "texto")]
    pub text: String,
}

// -- General configuration --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: String,
    #[serde(rename = "conteudo")]
    pub content: Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Platform-wide counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub total_users: i64,
    pub total_events: i64,
    pub total_media: i64,
    pub revenue: f64,
    pub active_subscriptions: i64,
}

// -- Auth --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
    pub expires_at: Option<DateTime<Utc>>,
}
