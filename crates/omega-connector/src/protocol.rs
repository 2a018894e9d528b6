// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line protocol spoken on the connector socket.
//
// One request per connection: `<command> <args...>` on a single line,
// whitespace separated.  Every response is one status-prefixed line:
//
//   OK: <payload>         success
//   ESYN: <message>       malformed request
//   EINTERNAL: <message>  station or connector failure
//
// `getPrintJobs` payloads are themselves newline-separated
// `jobname<TAB>when_submitted` records.

use std::fmt;

use tracing::debug;

use omega_core::error::{OmegaError, Result};
use omega_core::types::PrintJob;
use omega_edi::Station;

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetBalance { username: String },
    GetPrintJobs { username: String },
}

/// A response line, without its terminating newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Syntax(String),
    Internal(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(payload) => write!(f, "OK: {payload}"),
            Self::Syntax(message) => write!(f, "ESYN: {message}"),
            Self::Internal(message) => write!(f, "EINTERNAL: {message}"),
        }
    }
}

impl From<&OmegaError> for Response {
    fn from(err: &OmegaError) -> Self {
        match err {
            OmegaError::Syntax(message) => Self::Syntax(message.clone()),
            other => Self::Internal(error_message(other)),
        }
    }
}

/// User-facing text of an error: the translated message for station faults,
/// the error's own description otherwise.
pub fn error_message(err: &OmegaError) -> String {
    match err {
        OmegaError::Remote(fault) => fault.message().to_owned(),
        other => other.to_string(),
    }
}

/// Parse one request line.
pub fn parse_command(line: &str) -> Result<Command> {
    let mut tokens = line.split_whitespace();
    let (Some(command), Some(username)) = (tokens.next(), tokens.next()) else {
        return Err(OmegaError::Syntax("Syntax Error".into()));
    };
    let one_argument = tokens.next().is_none();

    match command {
        "getBalance" if one_argument => Ok(Command::GetBalance {
            username: username.to_owned(),
        }),
        "getPrintJobs" if one_argument => Ok(Command::GetPrintJobs {
            username: username.to_owned(),
        }),
        "getBalance" | "getPrintJobs" => Err(OmegaError::Syntax(format!(
            "{command} takes one argument"
        ))),
        unknown => Err(OmegaError::Syntax(format!("Unknown command {unknown}"))),
    }
}

/// Render a job listing payload.
pub fn format_jobs(jobs: &[PrintJob]) -> String {
    jobs.iter()
        .map(|job| format!("{}\t{}\n", job.job_name, job.submitted_at))
        .collect()
}

/// Run a parsed command against the station.
pub async fn execute(station: &Station, command: &Command, lock_user: bool) -> Response {
    let outcome = match command {
        Command::GetBalance { username } => station
            .get_balance(username, lock_user)
            .await
            .map(|balance| balance.to_string()),
        Command::GetPrintJobs { username } => station
            .get_print_jobs(username)
            .await
            .map(|jobs| format_jobs(&jobs)),
    };
    match outcome {
        Ok(payload) => Response::Ok(payload),
        Err(e) => {
            debug!(?command, error = %e, "command failed");
            Response::from(&e)
        }
    }
}

/// Parse and run one request line, producing the newline-terminated reply.
pub async fn handle_line(station: &Station, line: &str, lock_user: bool) -> String {
    let response = match parse_command(line) {
        Ok(command) => execute(station, &command, lock_user).await,
        Err(e) => Response::from(&e),
    };
    format!("{response}\n")
}
