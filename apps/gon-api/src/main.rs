//! # Gon API Server
//!
//! ```text
//! gon-api                      serve HTTP on GON_BIND_ADDR
//! gon-api issue-token <user>   print a bearer token for an existing user
//! ```

use anyhow::{bail, Context};
use gon_core::CallerIdentity;
use gon_db::{Database, DbConfig};
use tracing::{error, info};

use gon_api::config::ApiConfig;
use gon_api::{build_app, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load().context("Failed to load configuration")?;
    info!(
        bind_addr = %config.bind_addr,
        database = %config.database_path,
        conflict_retries = config.conflict_retries,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database_path)
            .max_connections(config.db_max_connections)
            .busy_timeout(config.db_busy_timeout()),
    )
    .await
    .context("Failed to open database")?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => serve(db, config).await,
        Some("issue-token") => {
            let user_id: i64 = args
                .next()
                .context("usage: gon-api issue-token <user_id>")?
                .parse()
                .context("user_id must be an integer")?;
            issue_token(db, config, user_id).await
        }
        Some(other) => bail!("Unknown command: {}", other),
    }
}

async fn serve(db: Database, config: ApiConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db.clone(), config);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(address = %bind_addr, "Gon API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn issue_token(db: Database, config: ApiConfig, user_id: i64) -> anyhow::Result<()> {
    let user = db
        .catalog()
        .user(user_id)
        .await?
        .with_context(|| format!("User {} does not exist", user_id))?;
    if !user.active {
        bail!("User {} is inactive", user_id);
    }

    let state = AppState::new(db, config);
    let token = state.jwt.issue_token(&CallerIdentity {
        user_id: user.id,
        role: user.role,
        company_id: user.company_id,
        branch_id: user.branch_id,
    })?;

    println!("{}", token);
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
