use oidc_demo::{
    config::ServerConfig,
    routes,
    setup::{run_server, setup_sentry, setup_tracing},
    state::AppState,
};
use tracing::info;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Must outlive the runtime so panics on worker threads are reported
    let _sentry_guard = setup_sentry();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing("oidc_demo")?;

    let server_config = ServerConfig::from_env()?;
    let app_state = AppState::from_env()?;

    info!(
        version = app_state.version(),
        redirect_uri = %app_state.session.config().redirect_uri,
        "Starting OIDC demo"
    );

    run_server(server_config, routes::routes(app_state)?).await
}
