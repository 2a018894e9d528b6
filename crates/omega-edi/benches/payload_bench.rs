// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for station payload parsing and fault translation in
// the omega-edi crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use omega_core::fault::translate;
use omega_edi::jobs::parse_job_listing;
use omega_edi::session::parse_station_config;

// ---------------------------------------------------------------------------
// Helper: build a job listing document
// ---------------------------------------------------------------------------

/// Listing with `count` jobs, every fourth one carrying a non-UTF-8 byte in
/// its name so the lossy decode path is exercised.
fn build_listing(count: usize) -> Vec<u8> {
    let mut buf = b"<print_jobs>".to_vec();
    for i in 0..count {
        buf.extend_from_slice(format!("<print_job><job_id>{i}</job_id><queue>bw</queue><jobname>").as_bytes());
        buf.extend_from_slice(b"report");
        if i % 4 == 0 {
            buf.push(0xE9);
        }
        buf.extend_from_slice(
            b".pdf</jobname><when_submitted>2013/02/14 09:05:33</when_submitted>\
              <username>alice</username><protected>1</protected></print_job>",
        );
    }
    buf.extend_from_slice(b"</print_jobs>");
    buf
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_parse_job_listing(c: &mut Criterion) {
    let small = build_listing(5);
    let large = build_listing(200);

    c.bench_function("parse_job_listing (5 jobs)", |b| {
        b.iter(|| {
            let jobs = parse_job_listing(black_box(&small));
            assert!(jobs.is_ok());
        });
    });

    c.bench_function("parse_job_listing (200 jobs)", |b| {
        b.iter(|| {
            let jobs = parse_job_listing(black_box(&large));
            assert!(jobs.is_ok());
        });
    });
}

fn bench_parse_station_config(c: &mut Criterion) {
    let document = r#"<pharos_stations><pharos_station name="wired-omega" print_server="PS01"><printers><printer name="w20-bw"/></printers></pharos_station></pharos_stations>"#;

    c.bench_function("parse_station_config", |b| {
        b.iter(|| {
            let parsed = parse_station_config(black_box(document));
            assert!(parsed.is_ok());
        });
    });
}

fn bench_translate(c: &mut Criterion) {
    let message = "An internal server error occurred. Script 'Alternative-Offline and Lock Fix': \
                   error after line 115: No user found matching: zed";

    c.bench_function("translate (user not found)", |b| {
        b.iter(|| black_box(translate(black_box("Pedi.InternalError"), black_box(message))));
    });
}

criterion_group!(
    benches,
    bench_parse_job_listing,
    bench_parse_station_config,
    bench_translate,
);
criterion_main!(benches);
