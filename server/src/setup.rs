use std::env;

use color_eyre::eyre::WrapErr;
use sentry::ClientInitGuard;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

use crate::config::ServerConfig;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn setup_tracing(crate_name: &str) -> color_eyre::Result<()> {
    let default_filter = format!("info,{crate_name}=debug,tower_http=debug");
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_filter))
        .wrap_err("Invalid tracing filter")?;

    let tree_layer = HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    Registry::default()
        .with(env_filter)
        .with(tree_layer)
        .with(sentry::integrations::tracing::layer())
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}

/// Start Sentry when `SENTRY_DSN` is set. The guard must outlive the runtime.
pub fn setup_sentry() -> Option<ClientInitGuard> {
    let dsn = env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: Some(env!("VERGEN_GIT_SHA").into()),
            traces_sample_rate: 0.0,
            ..Default::default()
        },
    )))
}

/// Serve the router until the process is stopped
pub async fn run_server(config: ServerConfig, app: axum::Router) -> color_eyre::Result<()> {
    let listener = TcpListener::bind(config.addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.addr))?;

    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app)
        .await
        .wrap_err("Server exited with an error")?;

    Ok(())
}
