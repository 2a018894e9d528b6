// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Omega connector.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Timestamp layout the station uses for `when_submitted`.
pub const SUBMITTED_AT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Clock information captured when a session is initialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneInfo {
    pub utc_time: String,
    pub utc_offset: String,
    pub zone_name: String,
}

/// Result of `InitializeSession2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInit {
    pub session_id: String,
    pub timezone: TimezoneInfo,
}

/// Optional enrichment from `GetPrintJobDetails`.
///
/// Each field is independently optional: the station may omit any of them,
/// and the whole struct stays at its default when the detail call faults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub page_count: Option<u32>,
    pub sheet_count: Option<u32>,
    pub cost: Option<f64>,
    pub attributes: Option<BTreeMap<String, String>>,
}

impl JobDetails {
    /// True when no detail attribute is present.
    pub fn is_empty(&self) -> bool {
        self.page_count.is_none()
            && self.sheet_count.is_none()
            && self.cost.is_none()
            && self.attributes.is_none()
    }
}

/// A held print job, identified by `(queue, job_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub job_id: String,
    pub queue: String,
    pub job_name: String,
    /// Raw station timestamp; see [`SUBMITTED_AT_FORMAT`].
    pub submitted_at: String,
    pub owner: String,
    pub is_protected: bool,
    pub details: JobDetails,
}

impl PrintJob {
    /// Parsed submission time, if the station sent a well-formed timestamp.
    pub fn submitted_time(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.submitted_at, SUBMITTED_AT_FORMAT).ok()
    }

    /// Submission time rendered with a `strftime` layout.
    pub fn formatted_date(&self, layout: &str) -> Option<String> {
        self.submitted_time().map(|t| t.format(layout).to_string())
    }
}

/// Product version reported by `GetProductVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVersion {
    pub product_name: String,
    pub major: String,
    pub minor: String,
    pub build: String,
    pub edi_build: String,
}

impl std::fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}.{} (build {}, EDI build {})",
            self.product_name, self.major, self.minor, self.build, self.edi_build
        )
    }
}

/// Result of `LoginUser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLogin {
    pub access_level: String,
    /// The username the card maps to.
    pub refer_id: String,
}

/// Opaque permission record from `GetUserPermissions`.
pub type UserPermissions = BTreeMap<String, String>;

/// Overdraft students carry on their account, in station balance units.
const STUDENT_OVERDRAFT: f64 = 10000.0;

/// Account record from `GetUserDetails3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    pub balance: f64,
    pub group: String,
    pub active: bool,
    /// Every other field the station returned.
    pub extra: BTreeMap<String, String>,
}

impl UserDetails {
    /// Balance in local integer units (tenfold the station balance).
    pub fn scaled_balance(&self) -> i64 {
        scale_balance(self.balance)
    }

    /// Site affiliation label for the station group.
    pub fn affiliation(&self) -> &'static str {
        match self.group.as_str() {
            "employee" => "faculty/staff",
            "student" => "student",
            "other" => "affiliate",
            group => {
                warn!(group, "cannot map group to a known affiliation");
                "unknown"
            }
        }
    }

    pub fn can_exceed_quota(&self) -> bool {
        self.group == "student"
    }

    /// Printable page balance; students have their overdraft removed first.
    pub fn page_balance(&self) -> i64 {
        let balance = if self.can_exceed_quota() {
            self.balance - STUDENT_OVERDRAFT
        } else {
            self.balance
        };
        scale_balance(balance)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Convert a station balance into the local integer unit.
pub fn scale_balance(raw: f64) -> i64 {
    (raw * 10.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(group: &str, balance: f64) -> UserDetails {
        UserDetails {
            balance,
            group: group.into(),
            active: true,
            extra: BTreeMap::new(),
        }
    }

    fn job(submitted_at: &str) -> PrintJob {
        PrintJob {
            job_id: "17".into(),
            queue: "bw".into(),
            job_name: "thesis.pdf".into(),
            submitted_at: submitted_at.into(),
            owner: "alice".into(),
            is_protected: false,
            details: JobDetails::default(),
        }
    }

    #[test]
    fn balance_is_scaled_tenfold_and_rounded() {
        assert_eq!(scale_balance(12.34), 123);
        assert_eq!(scale_balance(12.36), 124);
        assert_eq!(scale_balance(0.0), 0);
        assert_eq!(scale_balance(-1.26), -13);
    }

    #[test]
    fn affiliation_mapping() {
        assert_eq!(details("employee", 0.0).affiliation(), "faculty/staff");
        assert_eq!(details("student", 0.0).affiliation(), "student");
        assert_eq!(details("other", 0.0).affiliation(), "affiliate");
        assert_eq!(details("alumni", 0.0).affiliation(), "unknown");
    }

    #[test]
    fn student_page_balance_removes_overdraft() {
        let student = details("student", 10012.5);
        assert!(student.can_exceed_quota());
        assert_eq!(student.page_balance(), 125);
        assert_eq!(student.scaled_balance(), 100125);

        let staff = details("employee", 12.5);
        assert!(!staff.can_exceed_quota());
        assert_eq!(staff.page_balance(), 125);
    }

    #[test]
    fn formatted_date_parses_station_timestamps() {
        let j = job("2013/02/14 09:05:33");
        assert_eq!(j.formatted_date("%b %d %H:%M").as_deref(), Some("Feb 14 09:05"));
    }

    #[test]
    fn formatted_date_is_none_for_garbage() {
        assert!(job("yesterday").formatted_date("%H:%M").is_none());
        assert!(job("").submitted_time().is_none());
    }

    #[test]
    fn version_display() {
        let v = ProductVersion {
            product_name: "Uniprint".into(),
            major: "8".into(),
            minor: "3".into(),
            build: "2209".into(),
            edi_build: "51".into(),
        };
        assert_eq!(v.to_string(), "Uniprint 8.3 (build 2209, EDI build 51)");
    }

    #[test]
    fn empty_details() {
        assert!(JobDetails::default().is_empty());
        let d = JobDetails {
            page_count: Some(3),
            ..Default::default()
        };
        assert!(!d.is_empty());
    }
}
