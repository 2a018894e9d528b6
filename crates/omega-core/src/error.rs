// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the Omega connector.

use thiserror::Error;

use crate::fault::{DomainError, FaultKind};

/// Top-level error type for all Omega operations.
#[derive(Debug, Error)]
pub enum OmegaError {
    // -- Remote station --
    /// A fault raised by the station, already run through the translator.
    #[error("{0}")]
    Remote(#[from] DomainError),

    #[error("could not reach station: {0}")]
    Connectivity(String),

    #[error("No session.")]
    NoSession,

    #[error("malformed station payload: {0}")]
    Malformed(String),

    // -- Local surface --
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OmegaError {
    /// The translated fault kind, if this error came from the station.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Remote(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// True when the station reported that our session has gone away.
    pub fn is_session_not_running(&self) -> bool {
        self.fault_kind() == Some(FaultKind::SessionNotRunning)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OmegaError>;
