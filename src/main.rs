use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use murmur::api;
use murmur::cli;
use murmur::relay::{hub::Hub, BroadcastState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings();
    let listener = settings.bind()?;

    // One task owns all relay state
    let (hub, _hub_task) = Hub::spawn(BroadcastState::new(settings.relay_settings()));
    let api = api::api(hub);

    // Start server
    info!("Starting Murmur on {}", listener.local_addr()?);
    axum::Server::from_tcp(listener)?
        .serve(api.into_make_service())
        .await?;

    Ok(())
}
