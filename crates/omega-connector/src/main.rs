// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pharosconn — local socket front end to an Omega station.
//
// Entry point. Loads configuration, initialises logging, opens the station
// session and serves the line protocol until interrupted.

mod protocol;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use omega_core::config::ConnectorConfig;
use omega_core::error::Result;
use omega_edi::Station;

use server::SocketServer;

/// Serve Pharos balance and print job lookups on a local Unix socket.
#[derive(Debug, Parser)]
#[command(name = "pharosconn", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the socket path from the configuration.
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. `omega_edi=debug`).
    #[arg(long)]
    log_filter: Option<String>,
}

fn load_config(args: &Args) -> Result<ConnectorConfig> {
    let mut config = match &args.config {
        Some(path) => ConnectorConfig::load(path)?,
        None => {
            let mut config = ConnectorConfig::default();
            config.apply_env();
            config.validate()?;
            config
        }
    };
    if let Some(socket) = &args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(filter) = &args.log_filter {
        config.log_filter = filter.clone();
    }
    Ok(config)
}

async fn run(config: ConnectorConfig) -> Result<()> {
    let station = Station::connect(&config).await?;
    station.start().await?;

    match station.get_version().await {
        Ok(version) => info!(%version, "EDI server version"),
        Err(e) => warn!(error = %e, "could not read EDI server version"),
    }
    if let Some(session) = station.session_info().await {
        info!(
            station = %session.station_name,
            printer = %session.printer_name,
            print_server = %session.print_server,
            "station ready"
        );
    }

    let mut server = SocketServer::new(
        config.socket_path.clone(),
        Arc::new(station),
        config.lock_user_on_balance,
    );
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!(path = %server.socket_path().display(), "interrupted; shutting down");
    server.stop().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pharosconn: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), station = %config.station_name, "pharosconn starting");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pharosconn stopped");
            ExitCode::FAILURE
        }
    }
}
