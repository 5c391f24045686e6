//! Server entry point

use clap::Parser;
use rewards_ledger_engine::cli::ServerArgs;
use rewards_ledger_engine::config::LiveSettings;
use rewards_ledger_engine::http::{router, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("rewards_ledger_engine=info,info")
            }),
        )
        .init();

    let args = ServerArgs::parse();
    let settings = Arc::new(LiveSettings::new(args.to_settings()));
    let state = AppState::build(settings);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(bind = %args.bind, "reward ledger engine listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
