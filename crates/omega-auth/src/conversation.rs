// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Password-only authentication conversation.

use tracing::{debug, warn};

use crate::AuthError;

/// A message from the authentication module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Input requested, not to be echoed (a password).
    EchoOff(String),
    /// Input requested, echoed back (a username, an OTP, a question).
    EchoOn(String),
    /// Informational text.
    Info(String),
    /// Error text.
    Error(String),
}

/// Supplies one password to one hidden-input prompt.
///
/// Anything else that asks for input (an echoed prompt, or a second hidden
/// prompt) is refused and remembered as the failure reason.
#[derive(Debug)]
pub struct PasswordConversation {
    password: String,
    answered: bool,
    failure: Option<String>,
}

impl PasswordConversation {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_owned(),
            answered: false,
            failure: None,
        }
    }

    /// Answer one prompt.  Informational messages get an empty answer.
    pub fn respond(&mut self, prompt: Prompt) -> Result<String, AuthError> {
        match prompt {
            Prompt::EchoOff(text) if !self.answered => {
                debug!(prompt = %text, "answering password prompt");
                self.answered = true;
                Ok(self.password.clone())
            }
            Prompt::EchoOff(text) | Prompt::EchoOn(text) => {
                warn!(prompt = %text, "unexpected PAM prompt");
                self.failure = Some(text.clone());
                Err(AuthError::UnexpectedPrompt(text))
            }
            Prompt::Info(text) => {
                self.log_info(&text);
                Ok(String::new())
            }
            Prompt::Error(text) => {
                self.log_error(&text);
                Ok(String::new())
            }
        }
    }

    /// Record an informational message.  It needs no answer.
    pub fn log_info(&self, text: &str) {
        debug!(message = %text, "PAM info");
    }

    /// Record an error message from the module.  It needs no answer.
    pub fn log_error(&self, text: &str) {
        debug!(message = %text, "PAM error message");
    }

    /// Text of the prompt that was refused, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}
