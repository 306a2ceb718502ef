use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tunelink::{
    common::{AnyResult, banner, logger},
    configs::Config,
    player::ClockPlayerFactory,
    server::AppState,
    sources::RemoteLoadService,
    transport,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = match Config::locate() {
        Some(path) => Config::from_file(path)?,
        None => {
            eprintln!("No config.toml or config.default.toml found, using defaults");
            Config::default()
        }
    };

    logger::init(&config.logging);
    banner::print_banner(&banner::BuildInfo::default());

    let loader = Arc::new(RemoteLoadService::new(&config.loader)?);
    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let components = AppState::assemble(config, Arc::new(ClockPlayerFactory::default()), loader);
    let state = components.state;

    let shutdown = CancellationToken::new();
    let dispatcher = tokio::spawn(components.dispatcher.run(shutdown.clone()));
    let reaper = tokio::spawn(components.reaper.run(shutdown.clone()));

    let app = transport::http_server::router(state.clone());
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("tunelink listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down {} guild(s)", state.registry.len());
    state.registry.shutdown_all().await;
    shutdown.cancel();
    for task in [dispatcher, reaper] {
        if let Err(e) = task.await {
            error!("background task failed: {}", e);
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
