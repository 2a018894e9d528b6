// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Omega — Core types, fault translation and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod fault;
pub mod types;

pub use config::ConnectorConfig;
pub use error::OmegaError;
pub use fault::{DomainError, FaultKind, translate};
pub use types::*;
