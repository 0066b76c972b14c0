mod bootstrap;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use picfest_api::guest::{WizardRegistry, run_sweep_loop};
use picfest_api::{AppStateInner, build_router};
use picfest_db::Database;
use picfest_gateway::LiveConfig;

use crate::config::{Backend, Config};

/// How often idle guest wizard sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picfest=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Backend
    let (platform, files_dir) = match &config.backend {
        Backend::Local {
            db_path,
            storage_dir,
            jwt_secret,
        } => {
            let db = Arc::new(Database::open(db_path)?);
            tokio::fs::create_dir_all(storage_dir).await?;
            let platform = picfest_platform::local::platform(
                db.clone(),
                jwt_secret.clone(),
                storage_dir.clone(),
                &config.files_url(),
            );
            if let Some(admin) = &config.admin {
                bootstrap::ensure_admin(&platform, &db, admin).await?;
            }
            info!("Local backend: db {}, storage {}", db_path.display(), storage_dir.display());
            (platform, Some(storage_dir.clone()))
        }
        Backend::Supabase { url, service_key } => {
            if config.admin.is_some() {
                warn!("PICFEST_ADMIN_EMAIL is ignored on the supabase backend");
            }
            info!("Supabase backend at {}", url);
            (picfest_platform::supabase::platform(url, service_key.clone()), None)
        }
    };

    let live = LiveConfig {
        slideshow: config.slideshow,
        poll_interval: config.poll_interval,
        public_url: config.public_url.clone(),
    };
    let state = AppStateInner::new(
        platform,
        live,
        WizardRegistry::new(config.wizard_ttl),
        config.max_upload_bytes,
    );

    // Background sweep of abandoned upload sessions
    tokio::spawn(run_sweep_loop(state.clone(), SWEEP_INTERVAL));

    // The web app and the live displays are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = build_router(state, files_dir)
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("PicFest server listening on {}", addr);
    info!(
        "Uploads up to {} MB, guest sessions expire after {}s",
        config.max_upload_bytes / (1024 * 1024),
        config.wizard_ttl.as_secs()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
