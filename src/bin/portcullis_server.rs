//! Portcullis server
//!
//! Wires the SQLite credential store and the Redis session cache into the
//! authentication service and serves it over HTTP until Ctrl-C or SIGTERM.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use portcullis::observability::{self, ObservabilityConfig, SecurityEvent};
use portcullis::{
    create_pool, routes, AppConfig, AppState, AuthService, PasswordHasher, RedisSessionCache,
    SecureRouter, SessionManager, SqliteCredentialStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init(&ObservabilityConfig::from_env())?;
    portcullis::error::init(portcullis::error::ErrorConfig::from_env());

    let config = AppConfig::from_env();

    let pool = create_pool(&config.database)
        .await
        .context("credential store unavailable at startup")?;
    portcullis::security_event!(SecurityEvent::DatabaseConnected, "Credential store ready");

    let cache = RedisSessionCache::connect(&config.cache)
        .await
        .context("session cache unavailable at startup")?;
    portcullis::security_event!(SecurityEvent::CacheConnected, "Session cache ready");

    let sessions = SessionManager::new(Arc::new(cache), config.session_ttl, config.timeouts.cache);
    let auth = AuthService::new(
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        sessions,
        PasswordHasher::new(&config.hashing)?,
        config.timeouts.store,
    );

    let app = routes::router(AppState::new(auth, &config.http)).with_security(config.http.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    portcullis::security_event!(
        SecurityEvent::SystemStartup,
        address = %config.bind_addr,
        session_ttl_secs = config.session_ttl.as_secs(),
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    portcullis::security_event!(SecurityEvent::SystemShutdown, "Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
