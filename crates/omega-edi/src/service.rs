// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The logical EDI operation set consumed by the connector.
//
// `EdiService` is the seam between the session logic and the wire.  The
// production implementation is `SoapTransport`; tests substitute a scripted
// fake.  Every method returns the station's raw fault untranslated so that
// translation happens in exactly one place (`RemoteSession`).

use async_trait::async_trait;
use thiserror::Error;

use omega_core::types::{CardLogin, JobDetails, SessionInit, UserDetails, UserPermissions};

/// A fault exactly as the station reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    pub code: String,
    pub message: String,
}

impl RemoteFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single EDI call.
#[derive(Debug, Clone, Error)]
pub enum EdiError {
    /// The station answered with a SOAP fault.
    #[error("remote fault {}: {}", .0.code, .0.message)]
    Fault(RemoteFault),

    /// The station could not be reached or the HTTP exchange failed.
    #[error("transport: {0}")]
    Transport(String),

    /// The station answered with something we could not read.
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type EdiResult<T> = std::result::Result<T, EdiError>;

/// Remote operations of the Pharos EDI service.
///
/// Operations are named after the EDI calls they map to.  Payloads that the
/// station returns as embedded XML documents are passed back as raw text or
/// bytes; decoding them is the caller's job.
#[async_trait]
pub trait EdiService: Send + Sync {
    /// `Online`: liveness of the service itself, no session needed.
    async fn online(&self) -> EdiResult<()>;

    /// `InitializeSession2`.
    async fn initialize_session(&self, site_password: &str) -> EdiResult<SessionInit>;

    /// Attach (or with `None`, clear) the `session_id` header sent on every
    /// subsequent call.
    fn attach_session(&self, session_id: Option<&str>);

    /// `GetPharosStations2`: station configuration document.
    async fn get_pharos_stations(&self, station_name: &str) -> EdiResult<String>;

    /// `ConfigureSession3`.
    async fn configure_session(&self, station_name: &str, bank: &str) -> EdiResult<()>;

    /// `Ping`: liveness of the current session.
    async fn ping(&self) -> EdiResult<()>;

    /// `GetProductVersion`: version document.
    async fn get_product_version(&self) -> EdiResult<String>;

    /// `LoginUser` with a card id and no password.
    async fn login_user(&self, card_id: &str) -> EdiResult<CardLogin>;

    /// `GetUserDetails3`.
    async fn get_user_details(
        &self,
        username: &str,
        lock_user: bool,
        trans_type: i32,
    ) -> EdiResult<UserDetails>;

    /// `DeletePrintJob`.
    async fn delete_print_job(&self, print_server: &str, queue: &str, job_id: &str)
    -> EdiResult<()>;

    /// `UnlockUser`.
    async fn unlock_user(&self, username: &str) -> EdiResult<()>;

    /// `GetUserPermissions`.
    async fn get_user_permissions(
        &self,
        username: &str,
        printer_name: &str,
    ) -> EdiResult<UserPermissions>;

    /// `ListPrintJobsForStation`: raw listing document bytes.
    async fn list_print_jobs_for_station(
        &self,
        print_server: &str,
        station_name: &str,
        username: &str,
    ) -> EdiResult<Vec<u8>>;

    /// `GetPrintJobDetails`.
    async fn get_print_job_details(
        &self,
        print_server: &str,
        queue: &str,
        job_id: &str,
        username: &str,
    ) -> EdiResult<JobDetails>;

    /// `ReleaseAndRecordPrintJob3`: returns the printer the job went to.
    async fn release_and_record_print_job(
        &self,
        transaction_id: &str,
        print_server: &str,
        queue: &str,
        job_id: &str,
        station_name: &str,
        username: &str,
    ) -> EdiResult<String>;
}
