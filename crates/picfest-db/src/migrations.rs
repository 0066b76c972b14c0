use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE auth_users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE revoked_tokens (
                jti         TEXT PRIMARY KEY,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE profiles (
                id                    TEXT PRIMARY KEY,
                role                  TEXT NOT NULL DEFAULT 'convidado'
                                      CHECK (role IN ('admin', 'organizador', 'convidado')),
                nome                  TEXT NOT NULL,
                email                 TEXT NOT NULL UNIQUE COLLATE NOCASE,
                telefone              TEXT,
                instagram             TEXT,
                foto_perfil           TEXT,
                cpf                   TEXT,
                data_nascimento       TEXT,
                cep                   TEXT,
                endereco_logradouro   TEXT,
                endereco_numero       TEXT,
                endereco_complemento  TEXT,
                endereco_bairro       TEXT,
                endereco_cidade       TEXT,
                endereco_estado       TEXT,
                created_at            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE eventos (
                id              TEXT PRIMARY KEY,
                nome            TEXT NOT NULL,
                slug_curto      TEXT NOT NULL UNIQUE,
                data_evento     TEXT,
                organizador_id  TEXT NOT NULL REFERENCES profiles(id),
                status          TEXT NOT NULL DEFAULT 'ativo'
                                CHECK (status IN ('ativo', 'encerrado')),
                config_json     TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_eventos_organizador ON eventos(organizador_id, created_at);

            CREATE TABLE midias (
                id          TEXT PRIMARY KEY,
                evento_id   TEXT NOT NULL REFERENCES eventos(id),
                usuario_id  TEXT NOT NULL REFERENCES profiles(id),
                tipo        TEXT NOT NULL CHECK (tipo IN ('foto', 'video')),
                legenda     TEXT,
                url         TEXT NOT NULL,
                aprovado    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_midias_evento ON midias(evento_id, created_at);

            CREATE TABLE planos (
                id                TEXT PRIMARY KEY,
                nome              TEXT NOT NULL,
                limite_eventos    INTEGER NOT NULL DEFAULT 0,
                limite_midias     INTEGER NOT NULL DEFAULT 0,
                limite_storage    INTEGER NOT NULL DEFAULT 0,
                permite_download  INTEGER NOT NULL DEFAULT 0,
                valor             REAL NOT NULL DEFAULT 0,
                recorrencia       TEXT NOT NULL DEFAULT 'mensal',
                ativo             INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE assinaturas (
                id              TEXT PRIMARY KEY,
                organizador_id  TEXT NOT NULL REFERENCES profiles(id),
                plano_id        TEXT NOT NULL REFERENCES planos(id),
                status          TEXT NOT NULL DEFAULT 'pendente'
                                CHECK (status IN ('ativo', 'pendente', 'cancelado', 'expirado')),
                expira_em       TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_assinaturas_organizador ON assinaturas(organizador_id, created_at);

            CREATE TABLE depoimentos (
                id              TEXT PRIMARY KEY,
                organizador_id  TEXT REFERENCES profiles(id),
                nome            TEXT NOT NULL,
                foto_url        TEXT,
                estrelas        INTEGER NOT NULL CHECK (estrelas BETWEEN 1 AND 5),
                texto           TEXT NOT NULL,
                aprovado        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE configuracao_geral (
                id          TEXT PRIMARY KEY,
                conteudo    TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- Default pricing tiers
            INSERT INTO planos (id, nome, limite_eventos, limite_midias, limite_storage, permite_download, valor, recorrencia)
                VALUES ('00000000-0000-0000-0000-000000000101', 'Básico', 1, 500, 5, 0, 49.9, 'mensal');
            INSERT INTO planos (id, nome, limite_eventos, limite_midias, limite_storage, permite_download, valor, recorrencia)
                VALUES ('00000000-0000-0000-0000-000000000102', 'Profissional', 5, 5000, 50, 1, 99.9, 'mensal');
            INSERT INTO planos (id, nome, limite_eventos, limite_midias, limite_storage, permite_download, valor, recorrencia)
                VALUES ('00000000-0000-0000-0000-000000000103', 'Ilimitado', 0, 0, 200, 1, 199.9, 'mensal');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
