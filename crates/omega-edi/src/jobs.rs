// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job aggregation.
//
// A complete job record needs two remote calls: one `ListPrintJobsForStation`
// for the user, then one `GetPrintJobDetails` per listed job.  Detail failures
// only cost that job its enrichment; the listing itself always survives.
//
// Callers must already have authenticated the user locally.  Nothing here
// checks credentials.

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use omega_core::error::{OmegaError, Result};
use omega_core::types::{JobDetails, PrintJob};

use crate::service::EdiService;
use crate::session::SessionInfo;
use crate::xml;

/// List a user's held jobs on the session's station, in station order.
#[instrument(skip(service, session), fields(print_server = %session.print_server))]
pub async fn list_jobs(
    service: &dyn EdiService,
    session: &SessionInfo,
    username: &str,
) -> Result<Vec<PrintJob>> {
    let payload = service
        .list_print_jobs_for_station(&session.print_server, &session.station_name, username)
        .await?;
    let mut jobs = parse_job_listing(&payload)?;
    debug!(count = jobs.len(), "job listing received");

    for job in &mut jobs {
        match service
            .get_print_job_details(&session.print_server, &job.queue, &job.job_id, &job.owner)
            .await
        {
            Ok(details) => job.details = details,
            Err(e) => {
                debug!(job_id = %job.job_id, queue = %job.queue, error = %e, "job details unavailable");
            }
        }
    }

    Ok(jobs)
}

/// Release a held job; returns the printer the station sent it to.
///
/// Every call carries a fresh transaction id so a retried release can never
/// be mistaken for the original.
#[instrument(skip(service, session), fields(print_server = %session.print_server))]
pub async fn release(
    service: &dyn EdiService,
    session: &SessionInfo,
    job_id: &str,
    queue: &str,
    username: &str,
) -> Result<String> {
    let transaction_id = Uuid::new_v4().to_string();
    debug!(%transaction_id, "releasing job");
    let printer = service
        .release_and_record_print_job(
            &transaction_id,
            &session.print_server,
            queue,
            job_id,
            &session.station_name,
            username,
        )
        .await?;
    Ok(printer)
}

/// Parse a `ListPrintJobsForStation` document into listing-level records.
///
/// Bytes that are not valid UTF-8, or not representable in XML, are dropped
/// rather than failing the listing.  Entries without a job id or queue
/// cannot be addressed later and are skipped.
pub fn parse_job_listing(payload: &[u8]) -> Result<Vec<PrintJob>> {
    let text = xml::decode_lossy(payload);
    let root = xml::parse(&text).map_err(|e| OmegaError::Malformed(format!("job listing: {e}")))?;

    let mut jobs = Vec::new();
    for entry in root.children_named("print_job") {
        let text_of = |name: &str| entry.child_text(name).unwrap_or_default().to_owned();
        let (job_id, queue) = (text_of("job_id"), text_of("queue"));
        if job_id.is_empty() || queue.is_empty() {
            warn!(job_id = %job_id, queue = %queue, "skipping listing entry without identity");
            continue;
        }
        jobs.push(PrintJob {
            job_id,
            queue,
            job_name: text_of("jobname"),
            submitted_at: text_of("when_submitted"),
            owner: text_of("username"),
            is_protected: entry.child_text("protected").is_some_and(xml::parse_flag),
            details: JobDetails::default(),
        });
    }
    Ok(jobs)
}
