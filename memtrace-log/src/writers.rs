// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;

/// A non-blocking writer appending log lines to a file.
///
/// Writes are handed to a background thread. The [`WorkerGuard`] returned by
/// [`FileWriter::new`] owns that thread: dropping it flushes pending lines and stops the worker,
/// so it must outlive every event that should reach the file.
#[derive(Clone)]
pub struct FileWriter {
    non_blocking: NonBlocking,
}

impl FileWriter {
    /// Opens `path` for appending, creating it and its parent directory if needed.
    pub fn new(path: &Path) -> io::Result<(Self, WorkerGuard)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        Ok((FileWriter { non_blocking }, guard))
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.non_blocking.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.non_blocking.flush()
    }
}

impl<'a> MakeWriter<'a> for FileWriter {
    type Writer = NonBlocking;

    fn make_writer(&'a self) -> Self::Writer {
        self.non_blocking.clone()
    }
}
