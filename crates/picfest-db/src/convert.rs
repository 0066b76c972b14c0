//! Row → model conversion. Corrupt values are logged and replaced with
//! defaults instead of failing the whole query.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use picfest_types::models::{
    Address, ConfigEntry, Event, EventStatus, Media, MediaKind, Plan, Profile, Role, Subscription,
    SubscriptionStatus, Testimonial,
};

use crate::models::{
    ConfigRow, EventRow, MediaRow, PlanRow, ProfileRow, SubscriptionRow, TestimonialRow,
};

pub fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Plain datetime('now') output carries no timezone; treat as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            warn!("Corrupt date '{}': {}", s, e);
            None
        }
    })
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let role = row.role.parse().unwrap_or_else(|e| {
            warn!("Profile {}: {}", row.id, e);
            Role::Guest
        });
        Self {
            id: parse_uuid(&row.id, "profile id"),
            role,
            name: row.nome,
            email: row.email,
            phone: row.telefone,
            instagram: row.instagram,
            photo_url: row.foto_perfil,
            cpf: row.cpf,
            birth_date: parse_date(row.data_nascimento),
            address: Address {
                cep: row.cep,
                street: row.endereco_logradouro,
                number: row.endereco_numero,
                complement: row.endereco_complemento,
                district: row.endereco_bairro,
                city: row.endereco_cidade,
                state: row.endereco_estado,
            },
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            warn!("Event {}: {}", row.id, e);
            EventStatus::Closed
        });
        let config = serde_json::from_str(&row.config_json).unwrap_or_else(|e| {
            warn!("Corrupt config_json on event {}: {}", row.id, e);
            Default::default()
        });
        Self {
            id: parse_uuid(&row.id, "event id"),
            name: row.nome,
            slug: row.slug_curto,
            date: parse_date(row.data_evento),
            organizer_id: parse_uuid(&row.organizador_id, "organizer id"),
            status,
            config,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<MediaRow> for Media {
    fn from(row: MediaRow) -> Self {
        let kind = row.tipo.parse().unwrap_or_else(|e| {
            warn!("Media {}: {}", row.id, e);
            MediaKind::Photo
        });
        Self {
            id: parse_uuid(&row.id, "media id"),
            event_id: parse_uuid(&row.evento_id, "event id"),
            uploader_id: parse_uuid(&row.usuario_id, "uploader id"),
            kind,
            caption: row.legenda,
            url: row.url,
            approved: row.aprovado,
            created_at: parse_timestamp(&row.created_at),
            profile: row.perfil.map(Profile::from),
        }
    }
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: parse_uuid(&row.id, "plan id"),
            name: row.nome,
            event_limit: row.limite_eventos,
            media_limit: row.limite_midias,
            storage_limit_gb: row.limite_storage,
            allows_download: row.permite_download,
            price: row.valor,
            recurrence: row.recorrencia,
            active: row.ativo,
        }
    }
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            warn!("Subscription {}: {}", row.id, e);
            SubscriptionStatus::Expired
        });
        Self {
            id: parse_uuid(&row.id, "subscription id"),
            organizer_id: parse_uuid(&row.organizador_id, "organizer id"),
            plan_id: parse_uuid(&row.plano_id, "plan id"),
            status,
            expires_at: row.expira_em.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&row.created_at),
            plan: row.plano.map(Plan::from),
        }
    }
}

impl From<TestimonialRow> for Testimonial {
    fn from(row: TestimonialRow) -> Self {
        Self {
            id: parse_uuid(&row.id, "testimonial id"),
            organizer_id: row.organizador_id.as_deref().map(|id| parse_uuid(id, "organizer id")),
            name: row.nome,
            photo_url: row.foto_url,
            stars: row.estrelas.clamp(1, 5) as u8,
            text: row.texto,
            approved: row.aprovado,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<ConfigRow> for ConfigEntry {
    fn from(row: ConfigRow) -> Self {
        let content = serde_json::from_str(&row.conteudo).unwrap_or_else(|e| {
            warn!("Corrupt conteudo on config '{}': {}", row.id, e);
            serde_json::Value::Null
        });
        Self {
            id: row.id,
            content,
            updated_at: Some(parse_timestamp(&row.updated_at)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_shapes() {
        let iso = parse_timestamp("2024-05-01T12:30:00.250Z");
        let bare = parse_timestamp("2024-05-01 12:30:00");
        assert_eq!(iso.timestamp(), bare.timestamp());
    }

    #[test]
    fn corrupt_values_fall_back() {
        assert_eq!(parse_uuid("not-a-uuid", "test"), Uuid::default());
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
