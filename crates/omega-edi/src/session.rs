// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote session lifecycle against one Omega station.
//
// A session is established by a fixed setup sequence:
//
//   1. InitializeSession2(site_password)  -> session id + clock info
//   2. attach the session id as the `session_id` header of every later call
//   3. GetPharosStations2(station)        -> print server + printer name
//   4. ConfigureSession3(station, "")     -> empty billing bank
//
// The populated state is published only once all four steps succeed, so the
// session id, print server and printer name are either all present or all
// absent.  The state lives behind an async mutex; `ensure_connected` holds it
// across the ping and re-initialisation so concurrent requests never run the
// setup sequence twice.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use omega_core::config::ConnectorConfig;
use omega_core::error::{OmegaError, Result};
use omega_core::fault::{FaultKind, translate};
use omega_core::types::TimezoneInfo;

use crate::service::{EdiError, EdiService};
use crate::soap::SoapTransport;
use crate::xml;

/// Billing bank sent with `ConfigureSession3`.  Must be present (even empty)
/// or later calls fault with "No billing bank has been assigned".
const BILLING_BANK: &str = "";

impl From<EdiError> for OmegaError {
    fn from(err: EdiError) -> Self {
        match err {
            EdiError::Fault(fault) => OmegaError::Remote(translate(&fault.code, &fault.message)),
            EdiError::Transport(detail) => OmegaError::Connectivity(detail),
            EdiError::Malformed(detail) => OmegaError::Malformed(detail),
        }
    }
}

/// State of an established session.  Never partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub station_name: String,
    pub print_server: String,
    pub printer_name: String,
    pub timezone: TimezoneInfo,
}

/// Connection state for one station.
pub struct RemoteSession {
    service: Arc<dyn EdiService>,
    /// `None` means "not connected".
    state: Mutex<Option<Arc<SessionInfo>>>,
}

impl RemoteSession {
    /// Wrap an EDI service and check it with `Online`.
    ///
    /// Any failure here is reported as [`OmegaError::Connectivity`]: a
    /// station that is unreachable at construction time is fatal.
    pub async fn open(service: Arc<dyn EdiService>) -> Result<Self> {
        service
            .online()
            .await
            .map_err(|e| OmegaError::Connectivity(e.to_string()))?;
        debug!("EDI service online");
        Ok(Self {
            service,
            state: Mutex::new(None),
        })
    }

    /// Build the SOAP transport described by `config` and open it.
    pub async fn connect(config: &ConnectorConfig) -> Result<Self> {
        let transport = SoapTransport::new(config)?;
        info!(endpoint = transport.endpoint(), "connecting to EDI service");
        Self::open(Arc::new(transport)).await
    }

    pub fn service(&self) -> &dyn EdiService {
        self.service.as_ref()
    }

    /// Current session state, if established.
    pub async fn info(&self) -> Option<Arc<SessionInfo>> {
        self.state.lock().await.clone()
    }

    /// Snapshot of the session for a business call, or [`OmegaError::NoSession`].
    pub async fn require(&self) -> Result<Arc<SessionInfo>> {
        self.info().await.ok_or(OmegaError::NoSession)
    }

    /// Run the setup sequence and publish the resulting state.
    pub async fn start(&self, station_name: &str, site_password: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state, station_name, site_password)
            .await
    }

    /// Check the session with `Ping`.
    ///
    /// Only a `SessionNotRunning` fault means "disconnected"; every other
    /// failure is propagated.
    #[instrument(skip(self))]
    pub async fn is_connected(&self) -> Result<bool> {
        match self.service.ping().await {
            Ok(()) => Ok(true),
            Err(e) => {
                let err = OmegaError::from(e);
                if err.fault_kind() == Some(FaultKind::SessionNotRunning) {
                    debug!("session is not running");
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Re-run the setup sequence if the session has dropped.
    ///
    /// Returns `true` when a new session was established.
    pub async fn ensure_connected(&self, station_name: &str, site_password: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if self.is_connected().await? {
            return Ok(false);
        }
        if state.take().is_some() {
            warn!(station = station_name, "session dropped; re-initialising");
        }
        self.service.attach_session(None);
        self.start_locked(&mut state, station_name, site_password)
            .await?;
        Ok(true)
    }

    #[instrument(skip(self, state, site_password))]
    async fn start_locked(
        &self,
        state: &mut Option<Arc<SessionInfo>>,
        station_name: &str,
        site_password: &str,
    ) -> Result<()> {
        *state = None;
        match self.setup(station_name, site_password).await {
            Ok(info) => {
                info!(
                    station = %info.station_name,
                    print_server = %info.print_server,
                    printer = %info.printer_name,
                    zone = %info.timezone.zone_name,
                    "session started"
                );
                *state = Some(Arc::new(info));
                Ok(())
            }
            Err(e) => {
                self.service.attach_session(None);
                warn!(station = station_name, error = %e, "session setup failed");
                Err(e)
            }
        }
    }

    async fn setup(&self, station_name: &str, site_password: &str) -> Result<SessionInfo> {
        let init = self.service.initialize_session(site_password).await?;
        self.service.attach_session(Some(&init.session_id));

        let config = self.service.get_pharos_stations(station_name).await?;
        let (print_server, printer_name) = parse_station_config(&config)?;

        self.service
            .configure_session(station_name, BILLING_BANK)
            .await?;

        Ok(SessionInfo {
            session_id: init.session_id,
            station_name: station_name.to_owned(),
            print_server,
            printer_name,
            timezone: init.timezone,
        })
    }
}

/// Extract `(print_server, printer_name)` from a `GetPharosStations2` document.
///
/// Only one printer per station is supported; when several are configured
/// the first one is used.
pub fn parse_station_config(document: &str) -> Result<(String, String)> {
    let root = xml::parse(document)
        .map_err(|e| OmegaError::Malformed(format!("station configuration: {e}")))?;
    let station = root
        .child("pharos_station")
        .ok_or_else(|| OmegaError::Malformed("station configuration has no <pharos_station>".into()))?;
    let print_server = station
        .attr("print_server")
        .ok_or_else(|| OmegaError::Malformed("station has no print_server".into()))?;

    let printers = station.child("printers");
    let mut names = printers
        .into_iter()
        .flat_map(|p| p.children_named("printer"))
        .filter_map(|p| p.attr("name"));
    let printer_name = names
        .next()
        .ok_or_else(|| OmegaError::Malformed("station has no printer".into()))?;
    let extra = names.count();
    if extra > 0 {
        warn!(printer = printer_name, ignored = extra, "station has several printers; using the first");
    }

    Ok((print_server.to_owned(), printer_name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeStation;
    use crate::service::RemoteFault;

    async fn open(fake: &Arc<FakeStation>) -> RemoteSession {
        RemoteSession::open(fake.clone()).await.expect("open")
    }

    #[test]
    fn station_config_yields_server_and_first_printer() {
        let (server, printer) = parse_station_config(
            r#"<pharos_stations><pharos_station print_server="PS01">
                 <printers><printer name="w20-bw"/><printer name="w20-color"/></printers>
               </pharos_station></pharos_stations>"#,
        )
        .expect("parse");
        assert_eq!(server, "PS01");
        assert_eq!(printer, "w20-bw");
    }

    #[test]
    fn station_config_without_printer_is_malformed() {
        let result = parse_station_config(
            r#"<pharos_stations><pharos_station print_server="PS01"><printers/></pharos_station></pharos_stations>"#,
        );
        assert!(matches!(result, Err(OmegaError::Malformed(_))));
    }

    #[tokio::test]
    async fn open_fails_with_connectivity_error_when_unreachable() {
        let fake = Arc::new(FakeStation::new());
        fake.set_unreachable(true);
        let result = RemoteSession::open(fake.clone()).await;
        assert!(matches!(result, Err(OmegaError::Connectivity(_))));
    }

    #[tokio::test]
    async fn fields_absent_before_start_and_present_after() {
        let fake = Arc::new(FakeStation::new());
        let session = open(&fake).await;
        assert!(session.info().await.is_none());
        assert!(matches!(session.require().await, Err(OmegaError::NoSession)));

        session.start("wired-omega", "secret").await.expect("start");
        let info = session.require().await.expect("session");
        assert_eq!(info.session_id, "session-1");
        assert_eq!(info.print_server, "PS01");
        assert_eq!(info.printer_name, "w20-bw");
        assert_eq!(info.station_name, "wired-omega");
        assert_eq!(fake.attached_session().as_deref(), Some("session-1"));
        assert_eq!(fake.configured_banks(), vec![String::new()]);
    }

    #[tokio::test]
    async fn failed_start_leaves_session_empty() {
        let fake = Arc::new(FakeStation::new());
        fake.fail_configure(RemoteFault::new(
            "Pedi.InternalError",
            "An internal server error occurred. Unknown station",
        ));
        let session = open(&fake).await;

        let err = session.start("nowhere", "secret").await.expect_err("must fail");
        assert_eq!(err.fault_kind(), Some(FaultKind::Internal));
        assert_eq!(err.to_string(), "Unknown station");
        assert!(session.info().await.is_none());
        assert!(fake.attached_session().is_none());
    }

    #[tokio::test]
    async fn failed_initialize_is_translated() {
        let fake = Arc::new(FakeStation::new());
        fake.fail_initialize(RemoteFault::new("soap:Server", "Invalid site password"));
        let session = open(&fake).await;
        let err = session.start("wired-omega", "wrong").await.expect_err("must fail");
        assert_eq!(err.fault_kind(), Some(FaultKind::Unknown));
        assert!(session.info().await.is_none());
    }

    #[tokio::test]
    async fn is_connected_false_only_for_session_not_running() {
        let fake = Arc::new(FakeStation::new());
        let session = open(&fake).await;
        assert!(!session.is_connected().await.expect("ping"));

        session.start("wired-omega", "secret").await.expect("start");
        assert!(session.is_connected().await.expect("ping"));

        fake.fail_ping(RemoteFault::new("Pedi.InternalError", "Database offline"));
        let err = session.is_connected().await.expect_err("other faults propagate");
        assert_eq!(err.fault_kind(), Some(FaultKind::Internal));
    }

    #[tokio::test]
    async fn session_sentinel_under_internal_code_means_disconnected() {
        let fake = Arc::new(FakeStation::new());
        let session = open(&fake).await;
        session.start("wired-omega", "secret").await.expect("start");

        fake.fail_ping(RemoteFault::new("Pedi.InternalError", "The session is not running."));
        assert!(!session.is_connected().await.expect("ping"));

        assert!(session.ensure_connected("wired-omega", "secret").await.expect("reconnect"));
        assert_eq!(fake.initialize_calls(), 2);
        assert_eq!(session.require().await.expect("session").session_id, "session-2");
    }

    #[tokio::test]
    async fn ensure_connected_restarts_dropped_session() {
        let fake = Arc::new(FakeStation::new());
        let session = open(&fake).await;
        session.start("wired-omega", "secret").await.expect("start");

        assert!(!session.ensure_connected("wired-omega", "secret").await.expect("ok"));
        assert_eq!(fake.initialize_calls(), 1);

        fake.drop_session();
        assert!(session.ensure_connected("wired-omega", "secret").await.expect("ok"));
        assert_eq!(fake.initialize_calls(), 2);
        let info = session.require().await.expect("session");
        assert_eq!(info.session_id, "session-2");
    }

    #[tokio::test]
    async fn failed_reconnect_clears_stale_state() {
        let fake = Arc::new(FakeStation::new());
        let session = open(&fake).await;
        session.start("wired-omega", "secret").await.expect("start");

        fake.drop_session();
        fake.fail_initialize(RemoteFault::new("soap:Server", "Station locked"));
        assert!(session.ensure_connected("wired-omega", "secret").await.is_err());
        assert!(session.info().await.is_none());
    }
}
