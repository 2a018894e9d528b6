// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Omega auth — local username/password verification.
//
// Consumers authenticate a user locally before listing or releasing that
// user's jobs; the EDI session itself never checks user credentials.  The
// system backend is PAM (cargo feature `pam`), driven by a conversation that
// answers exactly one password prompt.

pub mod conversation;
#[cfg(feature = "pam")]
pub mod pam;

use std::path::Path;

use thiserror::Error;
use tracing::warn;

pub use conversation::{PasswordConversation, Prompt};
#[cfg(feature = "pam")]
pub use pam::PamAuthenticator;

/// PAM service name used by the connector.
pub const DEFAULT_PAM_SERVICE: &str = "pharosconn";

/// Where PAM service definitions live.
pub const PAM_CONFIG_DIR: &str = "/etc/pam.d";

/// Why an authentication attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// PAM asked for something other than a single hidden password.
    #[error("{0}")]
    UnexpectedPrompt(String),

    /// The authentication module rejected the credentials or failed.
    #[error("{0}")]
    Backend(String),
}

/// Verifies a username/password pair.
pub trait Authenticator {
    /// Returns `true` when the credentials are valid.  On failure the reason
    /// is available from [`Authenticator::last_error`].
    fn authenticate(&mut self, user: &str, password: &str) -> bool;

    /// Reason for the most recent failure; empty if there was none.
    fn last_error(&self) -> &str;
}

/// Whether `service` has a definition under `pam_dir`.  A missing definition
/// is only warned about, since PAM falls back to its `other` service.
pub fn service_configured(pam_dir: &Path, service: &str) -> bool {
    let exists = pam_dir.join(service).exists();
    if !exists {
        warn!(service, dir = %pam_dir.display(), "PAM service might not be valid");
    }
    exists
}
