// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Omega EDI — SOAP client, remote session lifecycle, print job aggregation
// and the station facade bound by consumers.

pub mod jobs;
pub mod service;
pub mod session;
pub mod soap;
pub mod station;
pub mod xml;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use service::{EdiError, EdiService, RemoteFault};
pub use session::{RemoteSession, SessionInfo};
pub use soap::SoapTransport;
pub use station::Station;
