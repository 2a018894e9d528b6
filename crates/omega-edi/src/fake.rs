// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory stand-in for an EDI server, for tests.
//
// Behaves like a single station with one print server (`PS01`) and one
// printer (`w20-bw`).  Sessions are numbered `session-1`, `session-2`, ...;
// every call other than `Online` and `InitializeSession2` faults with
// "The session is not running." unless it carries the current session id.
// Faults can be scripted per operation and every interesting call is recorded.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use omega_core::fault::SESSION_NOT_RUNNING_MESSAGE;
use omega_core::types::{
    CardLogin, JobDetails, SessionInit, TimezoneInfo, UserDetails, UserPermissions,
};

use crate::service::{EdiError, EdiResult, EdiService, RemoteFault};
use crate::xml;

const STATION_CONFIG: &str = r#"<pharos_stations><pharos_station name="wired-omega" print_server="PS01"><printers><printer name="w20-bw"/></printers></pharos_station></pharos_stations>"#;

const VERSION: &str = "<version><productname>Uniprint</productname><majornumber>8</majornumber><minornumber>3</minornumber><buildnumber>2209</buildnumber><edibuildnumber>51</edibuildnumber></version>";

/// Render a listing document for `(job_id, queue, job_name)` triples, owned
/// by `alice`.
pub fn listing_xml(jobs: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("<print_jobs>");
    for (job_id, queue, name) in jobs {
        out.push_str(&format!(
            "<print_job><job_id>{job_id}</job_id><queue>{queue}</queue><jobname>{}</jobname>\
             <when_submitted>2013/02/14 09:05:33</when_submitted><username>alice</username>\
             <protected>True</protected></print_job>",
            xml::escape(name)
        ));
    }
    out.push_str("</print_jobs>");
    out
}

#[derive(Default)]
struct State {
    unreachable: bool,
    sessions_started: u32,
    current_session: Option<String>,
    attached: Option<String>,
    initialize_calls: u32,
    ping_calls: u32,
    configured_banks: Vec<String>,
    listing: String,
    balance: f64,
    group: String,
    last_lock_flag: Option<bool>,
    initialize_fault: Option<RemoteFault>,
    configure_fault: Option<RemoteFault>,
    ping_fault: Option<RemoteFault>,
    listing_fault: Option<RemoteFault>,
    user_fault: Option<RemoteFault>,
    all_details_fault: Option<RemoteFault>,
    details_faults: HashMap<String, RemoteFault>,
    detail_requests: Vec<(String, String, String, String)>,
    release_transactions: Vec<String>,
    deleted: Vec<(String, String, String)>,
    unlocked: Vec<String>,
}

/// Scripted fake EDI server.
pub struct FakeStation {
    state: Mutex<State>,
    initialize_delay: Mutex<Duration>,
}

impl Default for FakeStation {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStation {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                listing: listing_xml(&[]),
                balance: 12.34,
                group: "student".into(),
                ..Default::default()
            }),
            initialize_delay: Mutex::new(Duration::ZERO),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Fail with `SessionNotRunning` unless the attached header is current.
    fn check_session(state: &State) -> EdiResult<()> {
        match (&state.current_session, &state.attached) {
            (Some(current), Some(attached)) if current == attached => Ok(()),
            _ => Err(EdiError::Fault(RemoteFault::new("Server", SESSION_NOT_RUNNING_MESSAGE))),
        }
    }

    fn fault(fault: &Option<RemoteFault>) -> EdiResult<()> {
        match fault {
            Some(f) => Err(EdiError::Fault(f.clone())),
            None => Ok(()),
        }
    }

    // -- scripting --

    pub fn set_unreachable(&self, unreachable: bool) {
        self.with(|s| s.unreachable = unreachable);
    }

    /// Expire the current session on the station side.
    pub fn drop_session(&self) {
        self.with(|s| s.current_session = None);
    }

    /// Slow down `InitializeSession2` to widen race windows.
    pub fn set_initialize_delay(&self, delay: Duration) {
        *self.initialize_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn set_listing(&self, jobs: &[(&str, &str, &str)]) {
        let listing = listing_xml(jobs);
        self.with(|s| s.listing = listing);
    }

    pub fn set_balance(&self, balance: f64) {
        self.with(|s| s.balance = balance);
    }

    pub fn fail_initialize(&self, fault: RemoteFault) {
        self.with(|s| s.initialize_fault = Some(fault));
    }

    pub fn fail_configure(&self, fault: RemoteFault) {
        self.with(|s| s.configure_fault = Some(fault));
    }

    pub fn fail_ping(&self, fault: RemoteFault) {
        self.with(|s| s.ping_fault = Some(fault));
    }

    pub fn fail_listing(&self, fault: RemoteFault) {
        self.with(|s| s.listing_fault = Some(fault));
    }

    pub fn fail_user(&self, fault: RemoteFault) {
        self.with(|s| s.user_fault = Some(fault));
    }

    pub fn fail_all_details(&self, fault: RemoteFault) {
        self.with(|s| s.all_details_fault = Some(fault));
    }

    pub fn fail_details_for(&self, job_id: &str, fault: RemoteFault) {
        self.with(|s| s.details_faults.insert(job_id.to_owned(), fault));
    }

    // -- observations --

    pub fn initialize_calls(&self) -> u32 {
        self.with(|s| s.initialize_calls)
    }

    pub fn ping_calls(&self) -> u32 {
        self.with(|s| s.ping_calls)
    }

    pub fn attached_session(&self) -> Option<String> {
        self.with(|s| s.attached.clone())
    }

    pub fn configured_banks(&self) -> Vec<String> {
        self.with(|s| s.configured_banks.clone())
    }

    pub fn last_lock_flag(&self) -> Option<bool> {
        self.with(|s| s.last_lock_flag)
    }

    pub fn detail_requests(&self) -> Vec<(String, String, String, String)> {
        self.with(|s| s.detail_requests.clone())
    }

    pub fn release_transactions(&self) -> Vec<String> {
        self.with(|s| s.release_transactions.clone())
    }

    pub fn deleted(&self) -> Vec<(String, String, String)> {
        self.with(|s| s.deleted.clone())
    }

    pub fn unlocked(&self) -> Vec<String> {
        self.with(|s| s.unlocked.clone())
    }
}

#[async_trait]
impl EdiService for FakeStation {
    async fn online(&self) -> EdiResult<()> {
        if self.with(|s| s.unreachable) {
            return Err(EdiError::Transport("connection refused".into()));
        }
        Ok(())
    }

    async fn initialize_session(&self, _site_password: &str) -> EdiResult<SessionInit> {
        let delay = *self.initialize_delay.lock().unwrap_or_else(|e| e.into_inner());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            s.initialize_calls += 1;
            Self::fault(&s.initialize_fault)?;
            s.sessions_started += 1;
            let id = format!("session-{}", s.sessions_started);
            s.current_session = Some(id.clone());
            Ok(SessionInit {
                session_id: id,
                timezone: TimezoneInfo {
                    utc_time: "2013-02-14T14:00:00".into(),
                    utc_offset: "-300".into(),
                    zone_name: "Eastern Standard Time".into(),
                },
            })
        })
    }

    fn attach_session(&self, session_id: Option<&str>) {
        self.with(|s| s.attached = session_id.map(str::to_owned));
    }

    async fn get_pharos_stations(&self, _station_name: &str) -> EdiResult<String> {
        self.with(|s| {
            Self::check_session(s)?;
            Ok(STATION_CONFIG.to_owned())
        })
    }

    async fn configure_session(&self, _station_name: &str, bank: &str) -> EdiResult<()> {
        self.with(|s| {
            Self::check_session(s)?;
            Self::fault(&s.configure_fault)?;
            s.configured_banks.push(bank.to_owned());
            Ok(())
        })
    }

    async fn ping(&self) -> EdiResult<()> {
        self.with(|s| {
            s.ping_calls += 1;
            Self::fault(&s.ping_fault)?;
            Self::check_session(s)
        })
    }

    async fn get_product_version(&self) -> EdiResult<String> {
        Ok(VERSION.to_owned())
    }

    async fn login_user(&self, card_id: &str) -> EdiResult<CardLogin> {
        self.with(|s| {
            Self::check_session(s)?;
            let access_level = if card_id.starts_with('9') { "admin" } else { "user" };
            Ok(CardLogin {
                access_level: access_level.to_owned(),
                refer_id: format!("user{card_id}"),
            })
        })
    }

    async fn get_user_details(
        &self,
        _username: &str,
        lock_user: bool,
        _trans_type: i32,
    ) -> EdiResult<UserDetails> {
        self.with(|s| {
            Self::check_session(s)?;
            Self::fault(&s.user_fault)?;
            s.last_lock_flag = Some(lock_user);
            Ok(UserDetails {
                balance: s.balance,
                group: s.group.clone(),
                active: true,
                extra: Default::default(),
            })
        })
    }

    async fn delete_print_job(&self, print_server: &str, queue: &str, job_id: &str) -> EdiResult<()> {
        self.with(|s| {
            Self::check_session(s)?;
            s.deleted
                .push((print_server.to_owned(), queue.to_owned(), job_id.to_owned()));
            Ok(())
        })
    }

    async fn unlock_user(&self, username: &str) -> EdiResult<()> {
        self.with(|s| {
            Self::check_session(s)?;
            s.unlocked.push(username.to_owned());
            Ok(())
        })
    }

    async fn get_user_permissions(
        &self,
        _username: &str,
        printer_name: &str,
    ) -> EdiResult<UserPermissions> {
        self.with(|s| {
            Self::check_session(s)?;
            let mut permissions = UserPermissions::new();
            permissions.insert("printer".into(), printer_name.to_owned());
            permissions.insert("can_print".into(), "1".into());
            Ok(permissions)
        })
    }

    async fn list_print_jobs_for_station(
        &self,
        _print_server: &str,
        _station_name: &str,
        _username: &str,
    ) -> EdiResult<Vec<u8>> {
        self.with(|s| {
            Self::check_session(s)?;
            Self::fault(&s.listing_fault)?;
            Ok(s.listing.clone().into_bytes())
        })
    }

    async fn get_print_job_details(
        &self,
        print_server: &str,
        queue: &str,
        job_id: &str,
        username: &str,
    ) -> EdiResult<JobDetails> {
        self.with(|s| {
            s.detail_requests.push((
                print_server.to_owned(),
                queue.to_owned(),
                job_id.to_owned(),
                username.to_owned(),
            ));
            Self::check_session(s)?;
            Self::fault(&s.all_details_fault)?;
            Self::fault(&s.details_faults.get(job_id).cloned())?;
            let pages = job_id.parse().ok();
            Ok(JobDetails {
                page_count: pages,
                sheet_count: pages,
                cost: pages.map(|p: u32| f64::from(p) * 0.1),
                attributes: None,
            })
        })
    }

    async fn release_and_record_print_job(
        &self,
        transaction_id: &str,
        _print_server: &str,
        _queue: &str,
        _job_id: &str,
        _station_name: &str,
        _username: &str,
    ) -> EdiResult<String> {
        self.with(|s| {
            Self::check_session(s)?;
            s.release_transactions.push(transaction_id.to_owned());
            Ok("w20-bw".to_owned())
        })
    }
}
