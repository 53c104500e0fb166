use clap::Parser;
use tiltpaint_server::{Relay, ServerConfig, ServerError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tiltpaint_server=info,tiltpaint_core=info,tower_http=info".into()
            }),
        )
        .init();

    let config = ServerConfig::parse();
    let addr = config.bind_addr();
    let relay = Relay::start(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("TiltPaint relay server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    relay.serve(listener, shutdown_signal()).await?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
