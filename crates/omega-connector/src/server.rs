// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unix socket listener for the line protocol.
//
// Each accepted connection is served in its own task: check the station
// session (reconnecting if it dropped), read one request line, write the
// reply, close.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use omega_core::error::{OmegaError, Result};
use omega_edi::Station;

use crate::protocol;

/// State shared by every connection task.
struct Shared {
    station: Arc<Station>,
    lock_user: bool,
}

/// The connector's socket server.
pub struct SocketServer {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl SocketServer {
    pub fn new(socket_path: impl Into<PathBuf>, station: Arc<Station>, lock_user: bool) -> Self {
        Self {
            socket_path: socket_path.into(),
            shared: Arc::new(Shared { station, lock_user }),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and start accepting connections.
    ///
    /// A stale socket file from an earlier run is removed first; failing to
    /// remove it is an error.
    pub async fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            debug!(path = %self.socket_path.display(), "socket server already running");
            return Ok(());
        }

        remove_socket(&self.socket_path)?;
        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            OmegaError::Config(format!("bind {}: {e}", self.socket_path.display()))
        })?;
        info!(path = %self.socket_path.display(), "listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::clone(&self.shared);
        self.task_handle = Some(tokio::spawn(async move {
            accept_loop(listener, shutdown, shared).await;
        }));
        Ok(())
    }

    /// Stop accepting, wait for the accept loop and remove the socket file.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };
        info!(path = %self.socket_path.display(), "stopping socket server");
        self.shutdown_signal.notify_one();
        if let Err(e) = handle.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        remove_socket(&self.socket_path)
    }
}

/// Remove `path` if it exists.
pub fn remove_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed socket file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!(path = %path.display(), error = %e, "couldn't remove socket");
            Err(OmegaError::Io(e))
        }
    }
}

async fn accept_loop(listener: UnixListener, shutdown: Arc<Notify>, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("accept loop received shutdown signal");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&shared);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                warn!(error = %e, "connection handler error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<Shared>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    // A failed reconnect is reported but the request is still attempted.
    if let Err(e) = state.station.ensure_connected().await {
        warn!(error = %e, "could not reconnect to station");
        let line = format!("EINTERNAL: Could not reconnect: {}\n", protocol::error_message(&e));
        writer.write_all(line.as_bytes()).await?;
    }

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    debug!(request = line.trim_end(), "request received");

    let reply = protocol::handle_line(&state.station, &line, state.lock_user).await;
    writer.write_all(reply.as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}
