// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

const ENV_MAX_TRACE_FILE_SIZE: &str = "MEMTRACE_MAX_TRACE_FILE_SIZE";
const ENV_SAMPLING_FREQUENCY: &str = "MEMTRACE_SAMPLING_FREQUENCY";

pub const DEFAULT_MAX_TRACE_FILE_SIZE: u64 = 64 * 1024 * 1024 * 1024;
pub const DEFAULT_SAMPLING_FREQUENCY: u64 = 1;
/// One second, in the trace's microsecond timestamps.
pub const DEFAULT_BUCKET_WIDTH: u64 = 1_000_000;
pub const DEFAULT_TIME_UNIT: u64 = 1_000_000;

/// Knobs for one tracing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// Tracing stops once the log would grow past this many bytes.
    pub max_trace_file_size: u64,
    /// Capture every N-th operation. 0 and 1 capture all of them.
    pub sampling_frequency: u64,
}

impl Default for TraceOptions {
    fn default() -> Self {
        TraceOptions {
            max_trace_file_size: DEFAULT_MAX_TRACE_FILE_SIZE,
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
        }
    }
}

impl TraceOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds options from `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = TraceOptions::default();
        TraceOptions {
            max_trace_file_size: parse_or(
                &lookup,
                ENV_MAX_TRACE_FILE_SIZE,
                defaults.max_trace_file_size,
            ),
            sampling_frequency: parse_or(
                &lookup,
                ENV_SAMPLING_FREQUENCY,
                defaults.sampling_frequency,
            ),
        }
    }

    pub fn to_env(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            (
                ENV_MAX_TRACE_FILE_SIZE,
                self.max_trace_file_size.to_string(),
            ),
            (ENV_SAMPLING_FREQUENCY, self.sampling_frequency.to_string()),
        ])
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring {name}={raw:?}: not a valid value, using {default}");
            default
        }),
    }
}

/// Shared memory sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmSinkOptions {
    /// Path-like identifier of a persistent region. `None` maps an anonymous region.
    pub key: Option<String>,
    /// Bytes of trace data the region can hold.
    pub capacity: u64,
    /// Compute a CRC32 of everything appended.
    pub file_checksum: bool,
    /// Combine caller-supplied checksum fragments instead of hashing appended bytes.
    pub buffered_data_with_checksum: bool,
}

impl Default for ShmSinkOptions {
    fn default() -> Self {
        ShmSinkOptions {
            key: None,
            capacity: 64 * 1024 * 1024,
            file_checksum: false,
            buffered_data_with_checksum: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Width of a throughput bucket, in timestamp units.
    pub bucket_width: u64,
    /// Timestamp units per reported second of speed.
    pub time_unit: u64,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            bucket_width: DEFAULT_BUCKET_WIDTH,
            time_unit: DEFAULT_TIME_UNIT,
        }
    }
}
