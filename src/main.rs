use socialhub::{build_state, config::Config, make_router, run_app};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("socialhub=debug,tower_http=info")),
        )
        .init();

    if let Err(error) = start().await {
        tracing::error!(error = ?error, "server exited with an error");
        std::process::exit(1);
    }
}

async fn start() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let address = config.socket_addr()?;
    let state = build_state(config).await?;
    run_app(make_router(state), address).await
}
