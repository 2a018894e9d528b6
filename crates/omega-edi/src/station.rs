// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Station facade: the object consumers bind to.
//
// Owns the one `RemoteSession` of the process together with the credentials
// needed to re-establish it.  Business operations take a snapshot of the
// session and never reconnect on their own; `ensure_connected` is the single
// recovery point and is meant to be called once per inbound request.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use omega_core::config::ConnectorConfig;
use omega_core::error::{OmegaError, Result};
use omega_core::types::{PrintJob, ProductVersion, UserDetails, UserPermissions, scale_balance};

use crate::jobs;
use crate::service::EdiService;
use crate::session::{RemoteSession, SessionInfo};
use crate::xml;

/// Transaction type passed to `GetUserDetails3` for balance lookups.
const BALANCE_TRANS_TYPE: i32 = 1;

/// One Omega station, as seen by the connector.
pub struct Station {
    session: RemoteSession,
    station_name: String,
    site_password: String,
}

impl Station {
    pub fn new(session: RemoteSession, station_name: &str, site_password: &str) -> Self {
        Self {
            session,
            station_name: station_name.to_owned(),
            site_password: site_password.to_owned(),
        }
    }

    /// Open the EDI service described by `config`.  Does not start a session.
    pub async fn connect(config: &ConnectorConfig) -> Result<Self> {
        let session = RemoteSession::connect(config).await?;
        Ok(Self::new(session, &config.station_name, &config.site_password))
    }

    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    fn service(&self) -> &dyn EdiService {
        self.session.service()
    }

    async fn snapshot(&self) -> Result<Arc<SessionInfo>> {
        self.session.require().await
    }

    /// Run the session setup sequence.
    pub async fn start(&self) -> Result<()> {
        self.session
            .start(&self.station_name, &self.site_password)
            .await
    }

    /// Re-establish the session if the station has dropped it.
    pub async fn ensure_connected(&self) -> Result<bool> {
        self.session
            .ensure_connected(&self.station_name, &self.site_password)
            .await
    }

    pub async fn is_connected(&self) -> Result<bool> {
        self.session.is_connected().await
    }

    pub async fn session_info(&self) -> Option<Arc<SessionInfo>> {
        self.session.info().await
    }

    /// Full account record for `username`.
    #[instrument(skip(self))]
    pub async fn get_user_details(&self, username: &str, lock_user: bool) -> Result<UserDetails> {
        self.snapshot().await?;
        let details = self
            .service()
            .get_user_details(username, lock_user, BALANCE_TRANS_TYPE)
            .await?;
        Ok(details)
    }

    /// Balance of `username` in local units: the station balance times ten,
    /// rounded.  `lock_user` also locks the account against a concurrent
    /// release.
    pub async fn get_balance(&self, username: &str, lock_user: bool) -> Result<i64> {
        let details = self.get_user_details(username, lock_user).await?;
        Ok(scale_balance(details.balance))
    }

    /// Held jobs for `username`, enriched with details where available.
    ///
    /// The caller must already have authenticated `username`.
    pub async fn get_print_jobs(&self, username: &str) -> Result<Vec<PrintJob>> {
        let session = self.snapshot().await?;
        jobs::list_jobs(self.service(), &session, username).await
    }

    /// Release a held job and return the printer it was sent to.
    pub async fn release_job(&self, job_id: &str, queue: &str, username: &str) -> Result<String> {
        let session = self.snapshot().await?;
        let printer = jobs::release(self.service(), &session, job_id, queue, username).await?;
        info!(job_id, queue, username, printer = %printer, "job released");
        Ok(printer)
    }

    #[instrument(skip(self))]
    pub async fn delete_job(&self, job_id: &str, queue: &str) -> Result<()> {
        let session = self.snapshot().await?;
        self.service()
            .delete_print_job(&session.print_server, queue, job_id)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn unlock_user(&self, username: &str) -> Result<()> {
        self.snapshot().await?;
        self.service().unlock_user(username).await?;
        Ok(())
    }

    /// Permissions of `username` on the station's printer.
    #[instrument(skip(self))]
    pub async fn get_user_permissions(&self, username: &str) -> Result<UserPermissions> {
        let session = self.snapshot().await?;
        let permissions = self
            .service()
            .get_user_permissions(username, &session.printer_name)
            .await?;
        Ok(permissions)
    }

    /// Map a card id to the username it belongs to.
    #[instrument(skip(self))]
    pub async fn username_from_card(&self, card_id: &str) -> Result<String> {
        self.snapshot().await?;
        let login = self.service().login_user(card_id).await?;
        if login.access_level != "user" {
            warn!(access_level = %login.access_level, "card login returned an unexpected access level");
        }
        Ok(login.refer_id)
    }

    /// Product version of the EDI server.  Diagnostic only.
    pub async fn get_version(&self) -> Result<ProductVersion> {
        let document = self.service().get_product_version().await?;
        parse_version(&document)
    }
}

/// Parse a `GetProductVersion` document.
pub fn parse_version(document: &str) -> Result<ProductVersion> {
    let root = xml::parse(document)
        .map_err(|e| OmegaError::Malformed(format!("product version: {e}")))?;
    let part = |name: &str| {
        root.find(name)
            .map(|e| e.trimmed_text().to_owned())
            .ok_or_else(|| OmegaError::Malformed(format!("product version has no <{name}>")))
    };
    Ok(ProductVersion {
        product_name: part("productname")?,
        major: part("majornumber")?,
        minor: part("minornumber")?,
        build: part("buildnumber")?,
        edi_build: part("edibuildnumber")?,
    })
}
