use std::net::SocketAddr;

use axum::Router;
use clap::Parser;
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod issuer;

/// Common CLI arguments for fixture servers
#[derive(Parser, Debug, Clone)]
pub struct FixtureArgs {
    /// The port to listen on
    #[arg(short, long, default_value = "0")]
    pub port: u16,

    /// The host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Base URL the server advertises, when it differs from the bound address
    #[arg(long)]
    pub public_url: Option<String>,
}

/// Run a fixture server until it is stopped.
///
/// The router is built after binding so it can advertise its own base URL,
/// which matters when `--port 0` picks a random port.
pub async fn run_server<F>(args: FixtureArgs, build: F) -> anyhow::Result<()>
where
    F: FnOnce(String) -> Router,
{
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let addr = format!("{}:{}", args.host, args.port).parse::<SocketAddr>()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let base_url = args
        .public_url
        .unwrap_or_else(|| format!("http://{local_addr}"));

    let app = build(base_url.clone()).layer(TraceLayer::new_for_http());

    info!("Fixture server listening on {local_addr}, advertising {base_url}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// A fixture issuer running on a random local port for the life of a test
pub struct RunningIssuer {
    pub base_url: String,
    pub state: issuer::IssuerState,
    handle: JoinHandle<()>,
}

impl Drop for RunningIssuer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_issuer() -> anyhow::Result<RunningIssuer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let state = issuer::IssuerState::new(base_url.clone());
    let app = issuer::router(state.clone());

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Fixture issuer stopped: {e}");
        }
    });

    Ok(RunningIssuer {
        base_url,
        state,
        handle,
    })
}
