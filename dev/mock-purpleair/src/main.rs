use anyhow::Result;
use mock_purpleair::{AppState, MockSettings, build_router};
use std::{net::SocketAddr, sync::Arc, sync::atomic::AtomicU32};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    eprintln!("[mock-purpleair] booting...");

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let MockSettings {
        sensor,
        fail_first,
        malformed_data,
        host,
        port,
    } = MockSettings::from_env()?;
    tracing::info!(
        sensor_id = sensor.sensor_id,
        fail_first,
        malformed_data,
        "mock sensor configured"
    );

    let state = Arc::new(AppState {
        sensor,
        fail_first,
        served_failures: AtomicU32::new(0),
        malformed_data,
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("mock-purpleair listening on http://{addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("mock-purpleair shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigint = signal(SignalKind::interrupt()).expect("listen SIGINT");
    let mut sigterm = signal(SignalKind::terminate()).expect("listen SIGTERM");
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
