use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use picfest_core::slideshow::SlideshowConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub enum Backend {
    /// SQLite file plus a storage directory served under `/files`.
    Local {
        db_path: PathBuf,
        storage_dir: PathBuf,
        jwt_secret: String,
    },
    /// Hosted project, reached with the service key.
    Supabase { url: String, service_key: String },
}

#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub public_url: String,
    pub slideshow: SlideshowConfig,
    pub poll_interval: Duration,
    pub max_upload_bytes: usize,
    pub wizard_ttl: Duration,
    pub admin: Option<AdminAccount>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let parse = |key: &str, default: &str| -> anyhow::Result<u64> {
            parse_value(key, &var(key, default))
        };

        let backend = match var("PICFEST_BACKEND", "local").as_str() {
            "local" => {
                let jwt_secret = var("PICFEST_JWT_SECRET", "");
                if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
                    bail!("PICFEST_JWT_SECRET is unset or still a placeholder.");
                }
                Backend::Local {
                    db_path: var("PICFEST_DB_PATH", "picfest.db").into(),
                    storage_dir: var("PICFEST_STORAGE_DIR", "./storage").into(),
                    jwt_secret,
                }
            }
            "supabase" => {
                let url = var("SUPABASE_URL", "");
                let service_key = var("SUPABASE_SERVICE_KEY", "");
                if url.is_empty() || service_key.is_empty() {
                    bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY are required for the supabase backend.");
                }
                Backend::Supabase { url, service_key }
            }
            other => bail!("PICFEST_BACKEND must be 'local' or 'supabase', got '{}'.", other),
        };

        let admin = match (lookup("PICFEST_ADMIN_EMAIL"), lookup("PICFEST_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some(AdminAccount {
                email: email.trim().to_lowercase(),
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host: var("PICFEST_HOST", "0.0.0.0"),
            port: parse_value("PICFEST_PORT", &var("PICFEST_PORT", "3000"))?,
            backend,
            public_url: var("PICFEST_PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            slideshow: SlideshowConfig {
                photo_interval: Duration::from_millis(parse("PICFEST_PHOTO_INTERVAL_MS", "8000")?),
                highlight_delay: Duration::from_millis(parse("PICFEST_HIGHLIGHT_DELAY_MS", "1000")?),
                ..SlideshowConfig::default()
            },
            poll_interval: Duration::from_secs(parse("PICFEST_POLL_INTERVAL_SECS", "15")?.max(1)),
            max_upload_bytes: (parse("PICFEST_MAX_UPLOAD_MB", "50")? as usize) * 1024 * 1024,
            wizard_ttl: Duration::from_secs(parse("PICFEST_WIZARD_TTL_SECS", "1800")?),
            admin,
        })
    }

    /// Public base of blobs kept by the local backend.
    pub fn files_url(&self) -> String {
        format!("{}/files", self.public_url)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value '{}'", key, raw))
}
