use dconnect::{DConnectSdk, SdkConfig, WsStatus};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dconnect=info")),
        )
        .init();

    #[cfg(feature = "env-file")]
    let config = SdkConfig::from_env_file("DCONNECT")?;
    #[cfg(not(feature = "env-file"))]
    let config = SdkConfig::from_env("DCONNECT")?;

    let sdk = DConnectSdk::new(config).await?;

    println!("Checking for a Device Connect Manager at {}...", sdk.config().base_url());
    match sdk.check_device_connect().await {
        Ok(version) => println!(
            "Manager is running (version {})",
            version.as_deref().unwrap_or("unknown")
        ),
        Err(e) => {
            println!("Manager is not available: {}", e);
            return Ok(());
        }
    }

    let services = sdk.discover_devices().await?;
    println!("Found {} services", services.len());
    for service in &services {
        println!(
            "  {} ({}) online: {}",
            service.name.as_deref().unwrap_or("-"),
            service.id,
            service.online.unwrap_or_default()
        );
    }

    sdk.connect_websocket(|status: WsStatus| println!("Event socket: {:?}", status))
        .await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    sdk.disconnect_websocket();

    Ok(())
}
