//! # Vyapar Server binary
//!
//! ```text
//! vyapar-server                        serve HTTP + /ws/kds
//! vyapar-server token <tenant> [role]  print a signed token for local testing
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vyapar_core::Role;
use vyapar_db::Database;
use vyapar_server::config::DEV_JWT_SECRET;
use vyapar_server::{router, AppState, JwtManager, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vyapar=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    let config = ServerConfig::load().context("loading configuration")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some("token") = args.first().map(String::as_str) {
        return print_token(&config, &args[1..]);
    }

    info!("Starting Vyapar server...");
    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("auth.jwt_secret is the development default, set VYAPAR__AUTH__JWT_SECRET");
    }

    let addr = config.socket_addr()?;
    info!(
        %addr,
        database = %config.database.path,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    info!("Database ready");

    let state = AppState::new(db.clone(), config);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn print_token(config: &ServerConfig, args: &[String]) -> anyhow::Result<()> {
    let Some(tenant_id) = args.first() else {
        anyhow::bail!("usage: vyapar-server token <tenant_id> [role]");
    };
    let role: Role = match args.get(1) {
        Some(role) => role.parse()?,
        None => Role::Admin,
    };

    let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_secs);
    let token = jwt.issue("cli", tenant_id, role)?;
    println!("{token}");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
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
                error!(?e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
