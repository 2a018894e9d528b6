// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PAM-backed authenticator.

use std::ffi::{CStr, CString};
use std::path::Path;

use pam_client::{Context, ConversationHandler, ErrorCode, Flag};
use tracing::debug;

use crate::conversation::{PasswordConversation, Prompt};
use crate::{Authenticator, DEFAULT_PAM_SERVICE, PAM_CONFIG_DIR, service_configured};

/// Bridges PAM's conversation callbacks to [`PasswordConversation`].
struct Handler {
    conversation: PasswordConversation,
}

impl Handler {
    fn answer(&mut self, prompt: Prompt) -> Result<CString, ErrorCode> {
        let text = self
            .conversation
            .respond(prompt)
            .map_err(|_| ErrorCode::CONV_ERR)?;
        CString::new(text).map_err(|_| ErrorCode::CONV_ERR)
    }
}

fn text(msg: &CStr) -> String {
    msg.to_string_lossy().into_owned()
}

impl ConversationHandler for Handler {
    fn prompt_echo_on(&mut self, msg: &CStr) -> Result<CString, ErrorCode> {
        self.answer(Prompt::EchoOn(text(msg)))
    }

    fn prompt_echo_off(&mut self, msg: &CStr) -> Result<CString, ErrorCode> {
        self.answer(Prompt::EchoOff(text(msg)))
    }

    fn text_info(&mut self, msg: &CStr) {
        self.conversation.log_info(&text(msg));
    }

    fn error_msg(&mut self, msg: &CStr) {
        self.conversation.log_error(&text(msg));
    }
}

/// Authenticates against a PAM service.
pub struct PamAuthenticator {
    service: String,
    error: String,
}

impl Default for PamAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_PAM_SERVICE)
    }
}

impl PamAuthenticator {
    pub fn new(service: &str) -> Self {
        service_configured(Path::new(PAM_CONFIG_DIR), service);
        Self {
            service: service.to_owned(),
            error: String::new(),
        }
    }
}

impl Authenticator for PamAuthenticator {
    fn authenticate(&mut self, user: &str, password: &str) -> bool {
        debug!(user, service = %self.service, "authenticating");
        let handler = Handler {
            conversation: PasswordConversation::new(password),
        };
        let mut context = match Context::new(&self.service, Some(user), handler) {
            Ok(context) => context,
            Err(e) => {
                self.error = e.to_string();
                return false;
            }
        };

        match context.authenticate(Flag::NONE) {
            Ok(()) => {
                debug!(user, "authentication successful");
                self.error.clear();
                true
            }
            Err(e) => {
                debug!(user, error = %e, "authentication failed");
                self.error = context
                    .conversation()
                    .conversation
                    .failure()
                    .map_or_else(|| e.to_string(), str::to_owned);
                false
            }
        }
    }

    fn last_error(&self) -> &str {
        &self.error
    }
}
