//! chatrelay-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the completion client, code store, mailer and token signer.
//! 4. Build the Axum router and serve with graceful shutdown.
//!
//! The database is not opened here; the first request that needs it
//! connects and runs migrations.

mod config;
mod entities;
mod error;
mod mailer;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::auth::TokenSigner;
use chatrelay_core::openai::OpenAiClient;
use chatrelay_core::verification::InMemoryCodeStore;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entities::SqlStore;
use crate::mailer::LogMailer;
use crate::state::AppState;

/// How often expired verification codes are swept from memory.
const CODE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CHATRELAY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "chatrelay-server starting");

    if cfg.uses_dev_token_secret() {
        warn!("CHATRELAY_TOKEN_SECRET is not set; using the development secret");
    }
    if cfg.upstream_api_key.is_empty() {
        warn!("CHATRELAY_UPSTREAM_API_KEY is not set; completions will be rejected upstream");
    }

    // ── 3. Services ────────────────────────────────────────────────────────────
    let completion = OpenAiClient::new(
        cfg.upstream_base_url.clone(),
        cfg.upstream_api_key.clone(),
        cfg.upstream_connect_timeout(),
    )?;
    info!(base_url = %cfg.upstream_base_url, model = %cfg.default_model, "completion upstream configured");

    let tokens = TokenSigner::new(&cfg.token_secret, cfg.token_ttl())?;
    let codes = Arc::new(InMemoryCodeStore::new());
    spawn_code_sweeper(Arc::clone(&codes));

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(SqlStore::new(cfg.database_url.clone())),
        completion: Arc::new(completion),
        codes,
        mailer: Arc::new(LogMailer::new(cfg.email_user.clone())),
        tokens,
    });

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chatrelay-server stopped");
    Ok(())
}

fn spawn_code_sweeper(codes: Arc<InMemoryCodeStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CODE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = codes.purge_expired(Utc::now());
            if purged > 0 {
                debug!(purged, "expired verification codes removed");
            }
        }
    });
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
