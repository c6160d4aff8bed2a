// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Offline aggregation of replayed traces.
//!
//! An [`Analyzer`] is fed records one at a time, in log order, and turned into
//! [`AnalyzerStats`] by [`Analyzer::finish`]. Speeds are counts per `time_unit` over the window
//! from the header's start time to the last record of the same family: memtable speeds use the
//! last memtable record, I/O speeds the last I/O record. A zero-length window reports zero speed.
//!
//! Counters saturate instead of wrapping, since lengths come straight from the trace.

mod report;
mod stats;

pub use report::{
    entry_stats_report, io_report, overall_report, table_stats_report, write_reports,
};
pub use stats::{AnalyzerStats, Buckets, EntityStats, IoStats};

use crate::options::AnalyzerOptions;
use crate::record::{IoRecord, TraceHeader, TraceRecord};
use stats::{peak, speed};

const WRITE_OPERATIONS: &[&str] = &["Append", "PositionedAppend", "Write"];
const READ_OPERATIONS: &[&str] = &["Read", "PositionedRead", "MultiRead"];

fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}

pub struct Analyzer {
    bucket_width: u64,
    time_unit: u64,
    stats: AnalyzerStats,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions, header: &TraceHeader) -> Self {
        Analyzer {
            bucket_width: options.bucket_width.max(1),
            time_unit: options.time_unit.max(1),
            stats: AnalyzerStats {
                begin_time: header.start_time,
                end_time: header.start_time,
                io: IoStats {
                    end_time: header.start_time,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// Folds one replayed record into the running totals.
    pub fn record(&mut self, record: &TraceRecord) {
        let stats = &mut self.stats;
        let timestamp = record.timestamp();
        let (entity_id, key, buckets) = match record {
            TraceRecord::Insert { entity_id, key, .. } => {
                bump(&mut stats.total_insert);
                bump(&mut stats.per_entity.entry(*entity_id).or_default().insert_count);
                (*entity_id, key, &mut stats.per_entity_insert_buckets)
            }
            TraceRecord::Lookup { entity_id, key, .. } => {
                bump(&mut stats.total_lookup);
                bump(&mut stats.per_entity.entry(*entity_id).or_default().lookup_count);
                (*entity_id, key, &mut stats.per_entity_lookup_buckets)
            }
            TraceRecord::Io(io) => {
                Self::record_io(&mut stats.io, io);
                return;
            }
        };
        stats.end_time = stats.end_time.max(timestamp);
        let bucket = timestamp.saturating_sub(stats.begin_time) / self.bucket_width;
        bump(buckets.entry(entity_id).or_default().entry(bucket).or_default());
        bump(
            stats
                .per_entity_key_access
                .entry(entity_id)
                .or_default()
                .entry(key.clone())
                .or_default(),
        );
    }

    fn record_io(io_stats: &mut IoStats, io: &IoRecord) {
        io_stats.end_time = io_stats.end_time.max(io.timestamp);
        bump(&mut io_stats.total_ops);
        let len = io.len.unwrap_or(0);
        let op = io.file_operation.as_str();
        if WRITE_OPERATIONS.contains(&op) {
            bump(&mut io_stats.write_ops);
            io_stats.write_bytes = io_stats.write_bytes.saturating_add(len);
        } else if READ_OPERATIONS.contains(&op) {
            bump(&mut io_stats.read_ops);
            io_stats.read_bytes = io_stats.read_bytes.saturating_add(len);
        }
    }

    fn window(&self, end_time: u64) -> f64 {
        end_time.saturating_sub(self.stats.begin_time) as f64 / self.time_unit as f64
    }

    /// Memtable window covered so far, in `time_unit`s.
    pub fn duration(&self) -> f64 {
        self.window(self.stats.end_time)
    }

    /// I/O window covered so far, in `time_unit`s.
    pub fn io_duration(&self) -> f64 {
        self.window(self.stats.io.end_time)
    }

    /// Derives speeds and peaks from the accumulated counts.
    pub fn finish(self) -> AnalyzerStats {
        let duration = self.duration();
        let io_duration = self.io_duration();
        let mut stats = self.stats;

        stats.insert_speed = speed(stats.total_insert, duration);
        stats.lookup_speed = speed(stats.total_lookup, duration);
        for (id, entity) in stats.per_entity.iter_mut() {
            entity.insert_speed = speed(entity.insert_count, duration);
            entity.lookup_speed = speed(entity.lookup_count, duration);
            entity.insert_peak_qps = peak(stats.per_entity_insert_buckets.get(id));
            entity.lookup_peak_qps = peak(stats.per_entity_lookup_buckets.get(id));
        }
        stats.io.read_speed = speed(stats.io.read_bytes, io_duration);
        stats.io.write_speed = speed(stats.io.write_bytes, io_duration);
        stats
    }
}
