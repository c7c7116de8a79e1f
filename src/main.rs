use env_logger::Env;
use log::{info, warn};
use signaling_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env()?;
    info!("starting signaling relay with {:?}", config);

    let server = RelayServer::bind(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
