// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use memtrace::analyzer::{write_reports, Analyzer};
use memtrace::options::AnalyzerOptions;
use memtrace::{TraceError, TraceHeader, TraceReader, TraceRecord};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct ParseOptions {
    pub input: PathBuf,
    /// Receives one line per record when set.
    pub output: Option<PathBuf>,
    /// Reports are computed and written here when set.
    pub report_dir: Option<PathBuf>,
    pub analyzer: AnalyzerOptions,
}

#[derive(Debug, Default)]
pub struct ParseSummary {
    pub records: u64,
    pub reports: Vec<PathBuf>,
    /// Set when the record stream ended on a damaged frame.
    pub stopped_early: Option<TraceError>,
}

pub fn format_header(header: &TraceHeader) -> String {
    format!(
        "Start Time: {}\nMajor Version: {}\nMinor Version: {}\n",
        header.start_time, header.format_major, header.format_minor
    )
}

pub fn format_record(record: &TraceRecord) -> String {
    match record {
        TraceRecord::Insert {
            timestamp,
            entity_id,
            sequence_number,
            key,
            value,
            key_size,
            value_size,
        } => format!(
            "Operation Time : {timestamp:<20}, Memtable id : {entity_id} Operation Type : insert \
             Operation Sequence Number : {sequence_number} Key size : {key_size} Key : {} \
             Value size : {value_size} Value :{}",
            key.escape_ascii(),
            value.escape_ascii()
        ),
        TraceRecord::Lookup {
            timestamp,
            entity_id,
            sequence_number,
            key,
            value,
        } => format!(
            "Operation Time : {timestamp:<20}, Memtable id : {entity_id} Operation Type : lookup \
             Operation Sequence Number : {sequence_number} Key : {} Value : {}",
            key.escape_ascii(),
            value.escape_ascii()
        ),
        TraceRecord::Io(io) => {
            let mut line = format!(
                "Access Time : {:<20}, File Name: {:<20}, File Operation: {:<18}, \
                 Latency: {:<10}, IO Status: {}",
                io.timestamp, io.file_name, io.file_operation, io.latency, io.io_status
            );
            // infallible for String
            if let Some(size) = io.file_size {
                let _ = write!(line, ", File Size: {size}");
            }
            if let Some(len) = io.len {
                let _ = write!(line, ", Length: {len}");
            }
            if let Some(offset) = io.offset {
                let _ = write!(line, ", Offset: {offset}");
            }
            if let Some(id) = &io.request_id {
                let _ = write!(line, ", Request Id: {id}");
            }
            line
        }
    }
}

/// Replays the trace at `options.input`.
///
/// Failing to open the trace, read its header or create an output file is an error. A damaged
/// record stream is not: replay stops at the last good record, the dump and reports cover what was
/// read, and the error is returned in [`ParseSummary::stopped_early`].
pub fn parse(options: &ParseOptions, stdout: &mut impl Write) -> anyhow::Result<ParseSummary> {
    let mut reader = TraceReader::open(&options.input)
        .with_context(|| format!("failed to open trace {}", options.input.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("failed to read the header of {}", options.input.display()))?;
    stdout.write_all(format_header(&header).as_bytes())?;
    debug!(start_time = header.start_time, "read trace header");

    let mut dump = match &options.output {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => None,
    };
    let mut analyzer = options
        .report_dir
        .as_ref()
        .map(|_| Analyzer::new(options.analyzer, &header));

    let mut summary = ParseSummary::default();
    for record in reader {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(records = summary.records, error = %e, "trace ended on a damaged record");
                summary.stopped_early = Some(e);
                break;
            }
        };
        summary.records += 1;
        if let Some(dump) = dump.as_mut() {
            writeln!(dump, "{}", format_record(&record)).context("failed to write dump")?;
        }
        if let Some(analyzer) = analyzer.as_mut() {
            analyzer.record(&record);
        }
    }
    if let Some(mut dump) = dump {
        dump.flush().context("failed to write dump")?;
    }

    if let (Some(analyzer), Some(dir)) = (analyzer, &options.report_dir) {
        let stats = analyzer.finish();
        summary.reports = write_reports(&stats, dir)
            .with_context(|| format!("failed to write reports to {}", dir.display()))?;
        info!(
            inserts = stats.total_insert,
            lookups = stats.total_lookup,
            io_ops = stats.io.total_ops,
            "wrote {} reports",
            summary.reports.len()
        );
    }
    Ok(summary)
}
