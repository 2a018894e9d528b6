// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fault translation: raw station faults -> stable local error taxonomy.
//
// The station reports failures as a (faultcode, faultstring) pair with an
// inconsistent vocabulary.  Callers display the translated message verbatim,
// so the exact strings below are a compatibility surface.

use thiserror::Error;

/// Fault code the station uses for every server-side exception.
pub const INTERNAL_ERROR_CODE: &str = "Pedi.InternalError";

/// Boilerplate the station prepends to internal error messages.
const INTERNAL_ERROR_PREFIX: &str = "An internal server error occurred. ";

/// Emitted by a site script on the station when a username is unknown.
pub const NO_USER_FOUND_MARKER: &str =
    "Script 'Alternative-Offline and Lock Fix': error after line 115: No user found matching: ";

/// Replacement message for [`NO_USER_FOUND_MARKER`] faults.
pub const USER_NOT_FOUND_MESSAGE: &str = "User not found in Pharos database.";

/// Exact faultstring the station returns once a session has expired.
pub const SESSION_NOT_RUNNING_MESSAGE: &str = "The session is not running.";

/// Classification of a station fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Generic server-side exception.
    Internal,
    /// The username does not exist on the station.
    UserNotFound,
    /// The session has expired; the only kind with a recovery path.
    SessionNotRunning,
    /// The request was malformed.  No translation rule produces this yet.
    Syntax,
    /// The session identity may not perform the operation.  No translation
    /// rule produces this yet.
    NotAuthorized,
    /// Anything else; the message is passed through untouched.
    Unknown,
}

/// A translated station fault.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainError {
    kind: FaultKind,
    message: String,
}

impl DomainError {
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Cleaned, user-presentable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Translate a raw fault into a [`DomainError`].
///
/// Rules are evaluated in order and the first match wins:
///
/// 1. A faultstring of exactly `"The session is not running."` is
///    [`FaultKind::SessionNotRunning`], whatever the code.  Session drop
///    detection depends on this, so it is checked on the raw message first.
/// 2. `Pedi.InternalError` has its boilerplate prefix stripped; the
///    no-user-found script error becomes [`FaultKind::UserNotFound`] with a
///    fixed message, anything else is [`FaultKind::Internal`].
/// 3. Everything else is [`FaultKind::Unknown`].
pub fn translate(fault_code: &str, fault_message: &str) -> DomainError {
    if fault_message == SESSION_NOT_RUNNING_MESSAGE {
        return DomainError {
            kind: FaultKind::SessionNotRunning,
            message: fault_message.to_owned(),
        };
    }

    if fault_code == INTERNAL_ERROR_CODE {
        let stripped = fault_message
            .strip_prefix(INTERNAL_ERROR_PREFIX)
            .unwrap_or(fault_message);
        return if stripped.contains(NO_USER_FOUND_MARKER) {
            DomainError {
                kind: FaultKind::UserNotFound,
                message: USER_NOT_FOUND_MESSAGE.to_owned(),
            }
        } else {
            DomainError {
                kind: FaultKind::Internal,
                message: stripped.to_owned(),
            }
        };
    }

    DomainError {
        kind: FaultKind::Unknown,
        message: fault_message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_prefix_is_stripped() {
        let e = translate(
            INTERNAL_ERROR_CODE,
            "An internal server error occurred. Printer queue is paused",
        );
        assert_eq!(e.kind(), FaultKind::Internal);
        assert_eq!(e.message(), "Printer queue is paused");
    }

    #[test]
    fn internal_error_without_prefix_is_kept() {
        let e = translate(INTERNAL_ERROR_CODE, "Database unavailable");
        assert_eq!(e.kind(), FaultKind::Internal);
        assert_eq!(e.message(), "Database unavailable");
    }

    #[test]
    fn no_user_found_script_error_becomes_user_not_found() {
        let raw = format!("An internal server error occurred. {NO_USER_FOUND_MARKER}jdoe");
        let e = translate(INTERNAL_ERROR_CODE, &raw);
        assert_eq!(e.kind(), FaultKind::UserNotFound);
        assert_eq!(e.message(), "User not found in Pharos database.");
    }

    #[test]
    fn no_user_found_marker_matches_anywhere_in_message() {
        let raw = format!("while locking: {NO_USER_FOUND_MARKER}alice (code 7)");
        let e = translate(INTERNAL_ERROR_CODE, &raw);
        assert_eq!(e.kind(), FaultKind::UserNotFound);
        assert_eq!(e.to_string(), USER_NOT_FOUND_MESSAGE);
    }

    #[test]
    fn no_user_found_marker_needs_internal_code() {
        let raw = format!("{NO_USER_FOUND_MARKER}alice");
        let e = translate("Pedi.Other", &raw);
        assert_eq!(e.kind(), FaultKind::Unknown);
        assert_eq!(e.message(), raw);
    }

    #[test]
    fn session_not_running_ignores_fault_code() {
        for code in ["soap:Server", "Pedi.SessionError", ""] {
            let e = translate(code, "The session is not running.");
            assert_eq!(e.kind(), FaultKind::SessionNotRunning, "code {code:?}");
        }
    }

    #[test]
    fn session_not_running_requires_exact_message() {
        let e = translate("soap:Server", "The session is not running");
        assert_eq!(e.kind(), FaultKind::Unknown);
    }

    #[test]
    fn session_sentinel_wins_over_internal_code() {
        let e = translate(INTERNAL_ERROR_CODE, "The session is not running.");
        assert_eq!(e.kind(), FaultKind::SessionNotRunning);
        assert_eq!(e.message(), SESSION_NOT_RUNNING_MESSAGE);
    }

    #[test]
    fn syntax_and_not_authorized_are_never_produced() {
        let faults = [
            ("soap:Client", "Syntax error in request"),
            ("Pedi.SyntaxError", "Bad argument"),
            ("Pedi.NotAuthorized", "Access denied"),
            (INTERNAL_ERROR_CODE, "Not authorized"),
        ];
        for (code, message) in faults {
            let kind = translate(code, message).kind();
            assert!(
                !matches!(kind, FaultKind::Syntax | FaultKind::NotAuthorized),
                "{code}: {message} gave {kind:?}"
            );
        }
    }

    #[test]
    fn unknown_faults_pass_through() {
        let e = translate("soap:Client", "Server did not recognize the value of HTTP Header SOAPAction");
        assert_eq!(e.kind(), FaultKind::Unknown);
        assert_eq!(
            e.message(),
            "Server did not recognize the value of HTTP Header SOAPAction"
        );
    }
}
