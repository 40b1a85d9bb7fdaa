use anyhow::Result;
use mock_service::Faults;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=debug")),
        )
        .init();

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:5000".to_string())
        .parse()?;

    info!("Serving mock notes API on {addr}");
    mock_service::run(addr, Faults::default()).await?;
    Ok(())
}
