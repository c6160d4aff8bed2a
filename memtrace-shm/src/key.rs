// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::Path;

const KEY_PREFIX: &str = "/memtrace.";

// macOS limits POSIX shm names to PSHMNAMLEN (31) bytes.
#[cfg(target_os = "macos")]
const MAX_NAME_LEN: usize = 31;
#[cfg(not(target_os = "macos"))]
const MAX_NAME_LEN: usize = 255;

/// Stable name of a shared memory region.
///
/// The same path always yields the same key, across processes and restarts, so a writer and a
/// companion reader agree on the region without exchanging handles.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShmKey {
    name: String,
}

impl ShmKey {
    /// Derives a key from a path-like identifier.
    ///
    /// The name keeps a readable, sanitized tail of the path and a CRC32 of the whole path so
    /// truncated names stay distinct.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ShmKey {
        let raw = path.as_ref().to_string_lossy();
        let checksum = crc32fast::hash(raw.as_bytes());
        let suffix = format!(".{checksum:08x}");

        let sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let sanitized = sanitized.trim_matches('_');

        let budget = MAX_NAME_LEN - KEY_PREFIX.len() - suffix.len();
        // sanitized is pure ASCII, so byte offsets are char boundaries
        let tail = &sanitized[sanitized.len().saturating_sub(budget)..];

        ShmKey {
            name: format!("{KEY_PREFIX}{tail}{suffix}"),
        }
    }

    /// The POSIX shared memory object name, always starting with `/`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ShmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
