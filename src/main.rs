//! Tagarela chat server
//!
//! Usage:
//!   tagarela                         # listen on 0.0.0.0:12345, log to server.log
//!   tagarela 5000 --log stdout       # specific port, log to stdout
//!   tagarela --config tagarela.json  # load settings from a JSON file

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tagarela::{ChatServer, CliArgs, Logger, PipelineLayer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = ServerConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    config
        .apply_cli_overrides(&args)
        .context("invalid command-line arguments")?;

    let logger = Logger::new();
    logger
        .init(config.log_sink(), config.log_level)
        .context("failed to start logging")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(PipelineLayer::new(logger.clone()))
        .init();

    logger.info("=== Servidor de chat iniciando ===");
    info!("bind address: {}", config.bind_addr);
    info!("log target: {} (min level {})", config.log_target, config.log_level);
    info!(
        "history: {} lines, /history replays {}",
        config.history_capacity, config.history_replay
    );

    let server = Arc::new(ChatServer::new(config, logger.clone()));

    let signals = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            wait_for_signal().await;
            server.shutdown();
        })
    };

    let result = server.run().await;
    signals.abort();

    match &result {
        Ok(()) => logger.info("=== Servidor de chat finalizado ==="),
        Err(e) => {
            error!("server error: {}", e);
            logger.error(format!("Servidor encerrado com erro: {}", e));
        }
    }
    logger.shutdown();

    result.map_err(Into::into)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
            _ = terminate.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C");
        }
    }
}
