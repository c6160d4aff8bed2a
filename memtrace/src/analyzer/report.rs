// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::stats::{AnalyzerStats, IoStats};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn overall_report(stats: &AnalyzerStats) -> String {
    format!(
        "Overall operations: {} , Insert: {}  Lookup: {}\nInsert Speed: {:.2} Lookup Speed: {:.2}\n",
        stats.total_ops(),
        stats.total_insert,
        stats.total_lookup,
        stats.insert_speed,
        stats.lookup_speed
    )
}

/// Per-key access counts of one memtable, most accessed first.
pub fn entry_stats_report(stats: &AnalyzerStats, entity_id: u64) -> String {
    let mut out = format!("Memtable id: {entity_id}\n");
    for (key, count) in stats.key_access_ranking(entity_id) {
        // infallible for String
        let _ = writeln!(out, "Key : {} access Time: {count}", key.escape_ascii());
    }
    out
}

pub fn table_stats_report(stats: &AnalyzerStats) -> String {
    let mut out = String::new();
    for (id, entity) in &stats.per_entity {
        let _ = writeln!(
            out,
            "memtable id: {id} total Insert: {} speed: {:.2} total Lookup: {} speed: {:.2}",
            entity.insert_count, entity.insert_speed, entity.lookup_count, entity.lookup_speed
        );
        let _ = writeln!(
            out,
            "Insert peak-qps: {} Lookup peak-qps: {}",
            entity.insert_peak_qps, entity.lookup_peak_qps
        );
    }
    out
}

pub fn io_report(io: &IoStats) -> String {
    format!(
        "******** Analyze IO speed ********\n\
         Read Bytes: {} Read Speed: {:.2} Write Bytes: {} Write Speed: {:.2}\n",
        io.read_bytes, io.read_speed, io.write_bytes, io.write_speed
    )
}

/// Writes every report for `stats` into `dir`, returning the files written.
///
/// `io.txt` is only written when the trace held I/O records.
pub fn write_reports(stats: &AnalyzerStats, dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    let mut emit = |name: String, contents: String| -> io::Result<()> {
        let path = dir.join(name);
        fs::write(&path, contents)?;
        debug!(path = %path.display(), "wrote report");
        written.push(path);
        Ok(())
    };

    emit("overall.txt".to_owned(), overall_report(stats))?;
    for id in stats.per_entity_key_access.keys() {
        emit(format!("{id}_entry_stats.txt"), entry_stats_report(stats, *id))?;
    }
    emit("ret_table_stats.txt".to_owned(), table_stats_report(stats))?;
    if !stats.io.is_empty() {
        emit("io.txt".to_owned(), io_report(&stats.io))?;
    }
    Ok(written)
}
