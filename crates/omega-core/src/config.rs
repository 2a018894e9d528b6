// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connector configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OmegaError, Result};

/// Default location of the station's WSDL, relative to the host.
pub const DEFAULT_WSDL_PATH: &str = "/PharosEdi/EdiService.asmx?WSDL";

/// Environment variable that overrides `site_password`.
pub const SITE_PASSWORD_ENV: &str = "OMEGA_SITE_PASSWORD";

/// Settings for the connector daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Hostname of the EDI server (should be a FQDN).
    pub edi_host: String,
    /// Talk to the EDI server over HTTPS.
    pub use_ssl: bool,
    /// WSDL path on the EDI server.
    pub wsdl_path: String,
    /// SOAP target namespace of the EDI service.
    pub namespace: String,
    /// Omega station this connector emulates.
    pub station_name: String,
    /// Site password for `InitializeSession2`.
    pub site_password: String,
    /// Unix socket the line protocol listens on.
    pub socket_path: PathBuf,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Whether `getBalance` locks the user against concurrent release.
    pub lock_user_on_balance: bool,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            edi_host: "pharos-prod.mit.edu".into(),
            use_ssl: true,
            wsdl_path: DEFAULT_WSDL_PATH.into(),
            namespace: "http://www.pharos.com/PharosEdi/".into(),
            station_name: "wired-omega".into(),
            site_password: String::new(),
            socket_path: PathBuf::from("/var/run/pharosconn.sock"),
            request_timeout_secs: 30,
            lock_user_on_balance: false,
            log_filter: "info".into(),
        }
    }
}

impl ConnectorConfig {
    /// Load from a TOML file, apply the environment override and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env();
        config.validate()?;
        info!(path = %path.display(), station = %config.station_name, "configuration loaded");
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| OmegaError::Config(e.to_string()))
    }

    /// Take `site_password` from the environment when set.
    pub fn apply_env(&mut self) {
        if let Ok(password) = std::env::var(SITE_PASSWORD_ENV) {
            self.site_password = password;
        }
    }

    /// Reject settings the connector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.edi_host.trim().is_empty() {
            return Err(OmegaError::Config("edi_host must not be empty".into()));
        }
        if self.station_name.trim().is_empty() {
            return Err(OmegaError::Config("station_name must not be empty".into()));
        }
        if !self.edi_host.contains('.') {
            warn!(host = %self.edi_host, "edi_host is not a FQDN");
        }
        Ok(())
    }

    /// Full WSDL URL of the EDI service.
    pub fn wsdl_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}{}", self.edi_host, self.wsdl_path)
    }
}
