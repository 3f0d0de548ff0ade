//! classroom-daemon: serves the Classroom REST API, uploads and change feed.

mod config;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use classroom_core::{ClassroomContext, DocumentStore};
use env_logger::Env;

use crate::config::{Args, DaemonConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match DaemonConfig::from_args(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            log::error!("Invalid bind address {}:{}: {e}", config.host, config.port);
            return ExitCode::FAILURE;
        }
    };

    let store = match DocumentStore::open(&config.database) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open document store: {e}");
            return ExitCode::FAILURE;
        }
    };
    match store.dir() {
        Some(dir) => log::info!("Document store at {}", dir.display()),
        None => log::warn!("Document store is in memory; data is lost on exit"),
    }

    let ctx = ClassroomContext::builder()
        .store(Arc::new(store))
        .uploads_dir(config.uploads_dir)
        .build();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Shutdown signal received");
    };

    match classroom_http::serve(ctx, addr, config.static_dir, shutdown).await {
        Ok(()) => {
            log::info!("Server shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
