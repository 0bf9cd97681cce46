use clap::Parser;
use fixtures::{issuer, run_server, FixtureArgs};

/// Mock OpenID Connect issuer
#[derive(Parser, Debug)]
#[clap(name = "issuer-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    run_server(args.common, |base_url| {
        issuer::router(issuer::IssuerState::new(base_url))
    })
    .await
}
