use anyhow::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use picfest_types::models::{
    GuestProfileInput, NewEvent, NewMedia, NewTestimonial, PlanDraft, ProfileUpdate, Role,
};

use crate::Database;
use crate::models::{
    AuthUserRow, ConfigRow, EventRow, MediaRow, PlanRow, ProfileRow, SubscriptionRow,
    TestimonialRow,
};

const PROFILE_COLUMNS: &str = "p.id, p.role, p.nome, p.email, p.telefone, p.instagram, p.foto_perfil, \
     p.cpf, p.data_nascimento, p.cep, p.endereco_logradouro, p.endereco_numero, \
     p.endereco_complemento, p.endereco_bairro, p.endereco_cidade, p.endereco_estado, p.created_at";
const PROFILE_COLUMN_COUNT: usize = 17;

const EVENT_COLUMNS: &str =
    "id, nome, slug_curto, data_evento, organizador_id, status, config_json, created_at";

const MEDIA_COLUMNS: &str =
    "m.id, m.evento_id, m.usuario_id, m.tipo, m.legenda, m.url, m.aprovado, m.created_at";
const MEDIA_COLUMN_COUNT: usize = 8;

const PLAN_COLUMNS: &str = "pl.id, pl.nome, pl.limite_eventos, pl.limite_midias, pl.limite_storage, \
     pl.permite_download, pl.valor, pl.recorrencia, pl.ativo";

const TESTIMONIAL_COLUMNS: &str =
    "id, organizador_id, nome, foto_url, estrelas, texto, aprovado, created_at";

impl Database {
    // -- Auth users --

    /// Auth user and profile row in one transaction.
    pub fn create_account(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        name: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO auth_users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            tx.execute(
                "INSERT INTO profiles (id, role, nome, email) VALUES (?1, ?2, ?3, ?4)",
                (id, role.as_str(), name, email),
            )?;
            Ok(())
        })
    }

    pub fn get_auth_user_by_email(&self, email: &str) -> Result<Option<AuthUserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password FROM auth_users WHERE email = ?1",
                    [email],
                    auth_user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_auth_user_by_id(&self, id: &str) -> Result<Option<AuthUserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password FROM auth_users WHERE id = ?1",
                    [id],
                    auth_user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_auth_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE auth_users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(n > 0)
        })
    }

    /// Record a signed-out token id. Entries past their expiry are pruned
    /// on the way in.
    pub fn revoke_token(&self, jti: &str, expires_at: i64, now: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM revoked_tokens WHERE expires_at < ?1", [now])?;
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)",
                params![jti, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM revoked_tokens WHERE jti = ?1", [jti], |r| r.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Profiles --

    pub fn insert_profile(&self, id: &str, role: Role, name: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, role, nome, email) VALUES (?1, ?2, ?3, ?4)",
                (id, role.as_str(), name, email),
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "p.id = ?1", id))
    }

    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "p.email = ?1", email))
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM profiles p ORDER BY p.created_at DESC, p.rowid DESC",
                PROFILE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| profile_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply the non-empty fields of `update`. Returns false when no row matched.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        let text_fields: [(&'static str, &Option<String>); 11] = [
            ("nome", &update.name),
            ("telefone", &update.phone),
            ("instagram", &update.instagram),
            ("cpf", &update.cpf),
            ("cep", &update.address.cep),
            ("endereco_logradouro", &update.address.street),
            ("endereco_numero", &update.address.number),
            ("endereco_complemento", &update.address.complement),
            ("endereco_bairro", &update.address.district),
            ("endereco_cidade", &update.address.city),
            ("endereco_estado", &update.address.state),
        ];
        for (column, value) in text_fields {
            if let Some(v) = value {
                sets.push(column);
                values.push(SqlValue::Text(v.clone()));
            }
        }
        if let Some(date) = update.birth_date {
            sets.push("data_nascimento");
            values.push(SqlValue::Text(date.format("%Y-%m-%d").to_string()));
        }

        if sets.is_empty() {
            return Ok(self.get_profile(id)?.is_some());
        }

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 2))
            .collect();
        let sql = format!("UPDATE profiles SET {} WHERE id = ?1", assignments.join(", "));

        let mut bound = vec![SqlValue::Text(id.to_string())];
        bound.extend(values);

        self.with_conn(|conn| {
            let n = conn.execute(&sql, params_from_iter(bound))?;
            Ok(n > 0)
        })
    }

    pub fn set_profile_role(&self, id: &str, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE profiles SET role = ?2 WHERE id = ?1", (id, role.as_str()))?;
            Ok(n > 0)
        })
    }

    pub fn set_profile_photo(&self, id: &str, url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE profiles SET foto_perfil = ?2 WHERE id = ?1", (id, url))?;
            Ok(n > 0)
        })
    }

    /// Look a guest up by email, creating the profile on first sight.
    /// Returns the row and whether it was created by this call.
    pub fn get_or_create_guest_profile(
        &self,
        new_id: &str,
        guest: &GuestProfileInput,
    ) -> Result<(ProfileRow, bool)> {
        self.with_tx(|tx| {
            if let Some(existing) = query_profile(tx, "p.email = ?1", &guest.email)? {
                return Ok((existing, false));
            }

            tx.execute(
                "INSERT INTO profiles (id, role, nome, email, telefone, instagram)
                 VALUES (?1, 'convidado', ?2, ?3, ?4, ?5)",
                params![new_id, guest.name, guest.email, guest.phone, guest.instagram],
            )?;

            let created = query_profile(tx, "p.id = ?1", new_id)?
                .ok_or_else(|| anyhow::anyhow!("Guest profile vanished after insert"))?;
            Ok((created, true))
        })
    }

    pub fn count_profiles_by_role(&self, role: Role) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE role = ?1",
                [role.as_str()],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    // -- Events --

    pub fn insert_event(&self, id: &str, event: &NewEvent) -> Result<()> {
        let config = serde_json::to_string(&event.config)?;
        let date = event.date.map(|d| d.format("%Y-%m-%d").to_string());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO eventos (id, nome, slug_curto, data_evento, organizador_id, config_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, event.name, event.slug, date, event.organizer_id.to_string(), config],
            )?;
            Ok(())
        })
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, "id = ?1", id))
    }

    pub fn get_event_by_slug(&self, slug: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, "slug_curto = ?1", slug))
    }

    pub fn list_events_by_organizer(&self, organizer_id: &str) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM eventos WHERE organizador_id = ?1 ORDER BY created_at DESC, rowid DESC",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([organizer_id], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_events(&self) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM eventos ORDER BY created_at DESC, rowid DESC",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_event_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE eventos SET status = ?2 WHERE id = ?1", (id, status))?;
            Ok(n > 0)
        })
    }

    pub fn count_events(&self, organizer_id: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            let n = match organizer_id {
                Some(org) => conn.query_row(
                    "SELECT COUNT(*) FROM eventos WHERE organizador_id = ?1",
                    [org],
                    |r| r.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM eventos", [], |r| r.get(0))?,
            };
            Ok(n)
        })
    }

    // -- Media --

    pub fn insert_media(&self, id: &str, media: &NewMedia) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO midias (id, evento_id, usuario_id, tipo, legenda, url, aprovado)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    media.event_id.to_string(),
                    media.uploader_id.to_string(),
                    media.kind.as_str(),
                    media.caption,
                    media.url,
                    media.approved,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {} FROM midias m LEFT JOIN profiles p ON p.id = m.usuario_id WHERE m.id = ?1",
                MEDIA_COLUMNS, PROFILE_COLUMNS
            );
            let row = conn.query_row(&sql, [id], media_from_joined_row).optional()?;
            Ok(row)
        })
    }

    /// Media for an event, newest first, with uploader profiles joined.
    pub fn list_media_by_event(&self, event_id: &str, approved_only: bool) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            let filter = if approved_only { " AND m.aprovado = 1" } else { "" };
            let sql = format!(
                "SELECT {}, {} FROM midias m
                 LEFT JOIN profiles p ON p.id = m.usuario_id
                 WHERE m.evento_id = ?1{}
                 ORDER BY m.created_at DESC, m.rowid DESC",
                MEDIA_COLUMNS, PROFILE_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([event_id], media_from_joined_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_media_approval(&self, id: &str, approved: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE midias SET aprovado = ?2 WHERE id = ?1", params![id, approved])?;
            Ok(n > 0)
        })
    }

    pub fn delete_media(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM midias WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn count_media(&self, event_id: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            let n = match event_id {
                Some(ev) => conn.query_row(
                    "SELECT COUNT(*) FROM midias WHERE evento_id = ?1",
                    [ev],
                    |r| r.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM midias", [], |r| r.get(0))?,
            };
            Ok(n)
        })
    }

    // -- Plans --

    pub fn list_plans(&self, include_inactive: bool) -> Result<Vec<PlanRow>> {
        self.with_conn(|conn| {
            let filter = if include_inactive { "" } else { " WHERE pl.ativo = 1" };
            let sql = format!(
                "SELECT {} FROM planos pl{} ORDER BY pl.valor ASC",
                PLAN_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| plan_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_plan(&self, id: &str) -> Result<Option<PlanRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM planos pl WHERE pl.id = ?1", PLAN_COLUMNS);
            let row = conn.query_row(&sql, [id], |row| plan_from_row(row, 0)).optional()?;
            Ok(row)
        })
    }

    pub fn insert_plan(&self, id: &str, draft: &PlanDraft) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO planos (id, nome, limite_eventos, limite_midias, limite_storage,
                                     permite_download, valor, recorrencia, ativo)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    draft.name.as_deref().unwrap_or_default(),
                    draft.event_limit.unwrap_or(0),
                    draft.media_limit.unwrap_or(0),
                    draft.storage_limit_gb.unwrap_or(0),
                    draft.allows_download.unwrap_or(false),
                    draft.price.unwrap_or(0.0),
                    draft.recurrence.as_deref().unwrap_or("mensal"),
                    draft.active.unwrap_or(true),
                ],
            )?;
            Ok(())
        })
    }

    /// Apply the present fields of `draft`. Returns false when no row matched.
    pub fn update_plan(&self, id: &str, draft: &PlanDraft) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE planos SET
                    nome             = COALESCE(?2, nome),
                    limite_eventos   = COALESCE(?3, limite_eventos),
                    limite_midias    = COALESCE(?4, limite_midias),
                    limite_storage   = COALESCE(?5, limite_storage),
                    permite_download = COALESCE(?6, permite_download),
                    valor            = COALESCE(?7, valor),
                    recorrencia      = COALESCE(?8, recorrencia),
                    ativo            = COALESCE(?9, ativo)
                 WHERE id = ?1",
                params![
                    id,
                    draft.name,
                    draft.event_limit,
                    draft.media_limit,
                    draft.storage_limit_gb,
                    draft.allows_download,
                    draft.price,
                    draft.recurrence,
                    draft.active,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_plan(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM planos WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Subscriptions --

    /// Most recent subscription of an organizer, with its plan joined.
    pub fn latest_subscription(
        &self,
        organizer_id: &str,
        active_only: bool,
    ) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| query_latest_subscription(conn, organizer_id, active_only))
    }

    /// Point the organizer's subscription at a plan. The most recent row is
    /// updated in place; a row is created when the organizer has none.
    pub fn upsert_subscription(
        &self,
        new_id: &str,
        organizer_id: &str,
        plan_id: &str,
        status: &str,
        expires_at: Option<&str>,
    ) -> Result<SubscriptionRow> {
        self.with_tx(|tx| {
            match query_latest_subscription(tx, organizer_id, false)? {
                Some(existing) => {
                    tx.execute(
                        "UPDATE assinaturas SET plano_id = ?2, status = ?3, expira_em = ?4 WHERE id = ?1",
                        params![existing.id, plan_id, status, expires_at],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO assinaturas (id, organizador_id, plano_id, status, expira_em)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![new_id, organizer_id, plan_id, status, expires_at],
                    )?;
                }
            }
            query_latest_subscription(tx, organizer_id, false)?
                .ok_or_else(|| anyhow::anyhow!("Subscription vanished after upsert"))
        })
    }

    /// (active subscription count, summed plan price).
    pub fn active_subscription_revenue(&self) -> Result<(i64, f64)> {
        self.with_conn(|conn| {
            let out = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(pl.valor), 0)
                 FROM assinaturas a
                 LEFT JOIN planos pl ON pl.id = a.plano_id
                 WHERE a.status = 'ativo'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            Ok(out)
        })
    }

    // -- Testimonials --

    pub fn list_testimonials(&self, approved_only: bool) -> Result<Vec<TestimonialRow>> {
        self.with_conn(|conn| {
            let filter = if approved_only { " WHERE aprovado = 1" } else { "" };
            let sql = format!(
                "SELECT {} FROM depoimentos{} ORDER BY created_at DESC, rowid DESC",
                TESTIMONIAL_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], testimonial_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_testimonial(&self, id: &str) -> Result<Option<TestimonialRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM depoimentos WHERE id = ?1", TESTIMONIAL_COLUMNS);
            let row = conn.query_row(&sql, [id], testimonial_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn insert_testimonial(&self, id: &str, testimonial: &NewTestimonial) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO depoimentos (id, organizador_id, nome, foto_url, estrelas, texto)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    testimonial.organizer_id.map(|u| u.to_string()),
                    testimonial.name,
                    testimonial.photo_url,
                    testimonial.stars,
                    testimonial.text,
                ],
            )?;
            Ok(())
        })
    }

    pub fn set_testimonial_approval(&self, id: &str, approved: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE depoimentos SET aprovado = ?2 WHERE id = ?1",
                params![id, approved],
            )?;
            Ok(n > 0)
        })
    }

    // -- General configuration --

    pub fn get_config(&self, id: &str) -> Result<Option<ConfigRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, conteudo, updated_at FROM configuracao_geral WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ConfigRow {
                            id: row.get(0)?,
                            conteudo: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn upsert_config(&self, id: &str, content: &serde_json::Value) -> Result<()> {
        let raw = serde_json::to_string(content)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO configuracao_geral (id, conteudo) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                    conteudo = excluded.conteudo,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                (id, raw),
            )?;
            Ok(())
        })
    }
}

fn auth_user_from_row(row: &Row<'_>) -> rusqlite::Result<AuthUserRow> {
    Ok(AuthUserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
    })
}

fn query_profile(conn: &Connection, filter: &str, value: &str) -> Result<Option<ProfileRow>> {
    let sql = format!("SELECT {} FROM profiles p WHERE {}", PROFILE_COLUMNS, filter);
    let row = conn.query_row(&sql, [value], |row| profile_from_row(row, 0)).optional()?;
    Ok(row)
}

fn profile_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(at)?,
        role: row.get(at + 1)?,
        nome: row.get(at + 2)?,
        email: row.get(at + 3)?,
        telefone: row.get(at + 4)?,
        instagram: row.get(at + 5)?,
        foto_perfil: row.get(at + 6)?,
        cpf: row.get(at + 7)?,
        data_nascimento: row.get(at + 8)?,
        cep: row.get(at + 9)?,
        endereco_logradouro: row.get(at + 10)?,
        endereco_numero: row.get(at + 11)?,
        endereco_complemento: row.get(at + 12)?,
        endereco_bairro: row.get(at + 13)?,
        endereco_cidade: row.get(at + 14)?,
        endereco_estado: row.get(at + 15)?,
        created_at: row.get(at + PROFILE_COLUMN_COUNT - 1)?,
    })
}

fn query_latest_subscription(
    conn: &Connection,
    organizer_id: &str,
    active_only: bool,
) -> Result<Option<SubscriptionRow>> {
    let filter = if active_only { " AND a.status = 'ativo'" } else { "" };
    let sql = format!(
        "SELECT a.id, a.organizador_id, a.plano_id, a.status, a.expira_em, a.created_at, {}
         FROM assinaturas a
         LEFT JOIN planos pl ON pl.id = a.plano_id
         WHERE a.organizador_id = ?1{}
         ORDER BY a.created_at DESC, a.rowid DESC
         LIMIT 1",
        PLAN_COLUMNS, filter
    );
    let row = conn
        .query_row(&sql, [organizer_id], |row| {
            let plan_id: Option<String> = row.get(6)?;
            Ok(SubscriptionRow {
                id: row.get(0)?,
                organizador_id: row.get(1)?,
                plano_id: row.get(2)?,
                status: row.get(3)?,
                expira_em: row.get(4)?,
                created_at: row.get(5)?,
                plano: match plan_id {
                    Some(_) => Some(plan_from_row(row, 6)?),
                    None => None,
                },
            })
        })
        .optional()?;
    Ok(row)
}

fn query_event(conn: &Connection, filter: &str, value: &str) -> Result<Option<EventRow>> {
    let sql = format!("SELECT {} FROM eventos WHERE {}", EVENT_COLUMNS, filter);
    let row = conn.query_row(&sql, [value], event_from_row).optional()?;
    Ok(row)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        nome: row.get(1)?,
        slug_curto: row.get(2)?,
        data_evento: row.get(3)?,
        organizador_id: row.get(4)?,
        status: row.get(5)?,
        config_json: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Media columns followed by the LEFT JOINed profile columns.
fn media_from_joined_row(row: &Row<'_>) -> rusqlite::Result<MediaRow> {
    let profile_id: Option<String> = row.get(MEDIA_COLUMN_COUNT)?;
    Ok(MediaRow {
        id: row.get(0)?,
        evento_id: row.get(1)?,
        usuario_id: row.get(2)?,
        tipo: row.get(3)?,
        legenda: row.get(4)?,
        url: row.get(5)?,
        aprovado: row.get(6)?,
        created_at: row.get(7)?,
        perfil: match profile_id {
            Some(_) => Some(profile_from_row(row, MEDIA_COLUMN_COUNT)?),
            None => None,
        },
    })
}

fn plan_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        id: row.get(at)?,
        nome: row.get(at + 1)?,
        limite_eventos: row.get(at + 2)?,
        limite_midias: row.get(at + 3)?,
        limite_storage: row.get(at + 4)?,
        permite_download: row.get(at + 5)?,
        valor: row.get(at + 6)?,
        recorrencia: row.get(at + 7)?,
        ativo: row.get(at + 8)?,
    })
}

fn testimonial_from_row(row: &Row<'_>) -> rusqlite::Result<TestimonialRow> {
    Ok(TestimonialRow {
        id: row.get(0)?,
        organizador_id: row.get(1)?,
        nome: row.get(2)?,
        foto_url: row.get(3)?,
        estrelas: row.get(4)?,
        texto: row.get(5)?,
        aprovado: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn guest(email: &str) -> GuestProfileInput {
        GuestProfileInput {
            name: "Alice".into(),
            email: email.into(),
            phone: None,
            instagram: Some("alice".into()),
        }
    }

    #[test]
    fn guest_lookup_by_email_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        let (first, created) = db
            .get_or_create_guest_profile(&Uuid::new_v4().to_string(), &guest("alice@test.com"))
            .unwrap();
        assert!(created);

        let (second, created) = db
            .get_or_create_guest_profile(&Uuid::new_v4().to_string(), &guest("alice@test.com"))
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(db.count_profiles_by_role(Role::Guest).unwrap(), 1);
    }

    #[test]
    fn media_listing_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        let org = Uuid::new_v4();
        db.insert_profile(&org.to_string(), Role::Organizer, "Org", "org@test.com").unwrap();

        let event_id = Uuid::new_v4();
        db.insert_event(
            &event_id.to_string(),
            &NewEvent {
                name: "Gala".into(),
                slug: "GALA01".into(),
                date: None,
                organizer_id: org,
                config: Default::default(),
            },
        )
        .unwrap();

        let mut ids = Vec::new();
        for (i, approved) in [true, false, true].into_iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            db.insert_media(
                &id,
                &NewMedia {
                    event_id,
                    uploader_id: org,
                    kind: picfest_types::models::MediaKind::Photo,
                    caption: Some(format!("#{}", i)),
                    url: format!("https://cdn/{}.jpg", i),
                    approved,
                },
            )
            .unwrap();
            ids.push(id);
        }

        let approved = db.list_media_by_event(&event_id.to_string(), true).unwrap();
        assert_eq!(approved.len(), 2);
        // newest first
        assert_eq!(approved[0].id, ids[2]);
        assert_eq!(approved[0].perfil.as_ref().map(|p| p.nome.as_str()), Some("Org"));

        let all = db.list_media_by_event(&event_id.to_string(), false).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn profile_update_only_touches_given_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.insert_profile(&id, Role::Organizer, "Bruno", "bruno@test.com").unwrap();

        let mut update = ProfileUpdate::default();
        update.address.city = Some("Recife".into());
        assert!(db.update_profile(&id, &update).unwrap());

        let row = db.get_profile(&id).unwrap().unwrap();
        assert_eq!(row.nome, "Bruno");
        assert_eq!(row.endereco_cidade.as_deref(), Some("Recife"));
    }

    #[test]
    fn subscription_upsert_reuses_row() {
        let db = Database::open_in_memory().unwrap();
        let org = Uuid::new_v4().to_string();
        db.insert_profile(&org, Role::Organizer, "Org", "org@test.com").unwrap();

        let basic = "00000000-0000-0000-0000-000000000101";
        let pro = "00000000-0000-0000-0000-000000000102";

        let first = db.upsert_subscription(&Uuid::new_v4().to_string(), &org, basic, "pendente", None).unwrap();
        assert!(db.latest_subscription(&org, true).unwrap().is_none());

        let second = db.upsert_subscription(&Uuid::new_v4().to_string(), &org, pro, "ativo", None).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.plano.as_ref().map(|p| p.nome.as_str()), Some("Profissional"));

        let active = db.latest_subscription(&org, true).unwrap().unwrap();
        assert_eq!(active.plano_id, pro);
        assert_eq!(db.active_subscription_revenue().unwrap(), (1, 99.9));
    }

    #[test]
    fn testimonial_double_toggle_restores_visibility() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.insert_testimonial(
            &id,
            &NewTestimonial {
                organizer_id: None,
                name: "Rita".into(),
                photo_url: None,
                stars: 5,
                text: "Telão incrível".into(),
            },
        )
        .unwrap();
        db.set_testimonial_approval(&id, true).unwrap();
        let visible = db.list_testimonials(true).unwrap().len();

        db.set_testimonial_approval(&id, false).unwrap();
        assert!(db.list_testimonials(true).unwrap().is_empty());
        db.set_testimonial_approval(&id, true).unwrap();
        assert_eq!(db.list_testimonials(true).unwrap().len(), visible);
    }

    #[test]
    fn duplicate_slug_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let org = Uuid::new_v4();
        db.insert_profile(&org.to_string(), Role::Organizer, "Org", "org@test.com").unwrap();
        let event = NewEvent {
            name: "A".into(),
            slug: "SAME01".into(),
            date: None,
            organizer_id: org,
            config: Default::default(),
        };
        db.insert_event(&Uuid::new_v4().to_string(), &event).unwrap();
        let err = db.insert_event(&Uuid::new_v4().to_string(), &event).unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn config_upsert_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_config("landing_page", &serde_json::json!({"hero": "v1"})).unwrap();
        db.upsert_config("landing_page", &serde_json::json!({"hero": "v2"})).unwrap();

        let row = db.get_config("landing_page").unwrap().unwrap();
        assert!(row.conteudo.contains("v2"));
    }
}
