// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::TraceSink;
use crate::{Result, TraceError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sequential append-only trace file.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    size: u64,
}

impl FileSink {
    /// Creates `path`, truncating any previous trace.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "created trace file");
        Ok(FileSink {
            path,
            writer: Some(BufWriter::new(file)),
            size: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for FileSink {
    fn append(&mut self, data: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(TraceError::Closed)?;
        writer.write_all(data)?;
        self.size += data.len() as u64;
        Ok(data.len())
    }

    fn current_size(&self) -> u64 {
        self.size
    }

    fn flush(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TraceError::Closed)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_data()?;
        debug!(path = %self.path.display(), size = self.size, "closed trace file");
        Ok(())
    }
}
