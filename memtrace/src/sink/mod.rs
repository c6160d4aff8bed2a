// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable destinations for encoded trace bytes.

mod file;
mod listener;
mod shm;

pub use file::FileSink;
pub use listener::{FileOperationInfo, FileOperationType, SinkListener};
pub use shm::{ShmRegionReader, ShmSink, SizeMonitor};

use crate::Result;

/// An append-only byte destination.
///
/// Sinks never retry internally; every failure is returned to the caller.
pub trait TraceSink: Send {
    /// Appends all of `data`, returning the number of bytes written.
    fn append(&mut self, data: &[u8]) -> Result<usize>;

    /// Bytes appended so far.
    fn current_size(&self) -> u64;

    fn flush(&mut self) -> Result<()>;

    /// Flushes and releases the destination. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn append(&mut self, data: &[u8]) -> Result<usize> {
        (**self).append(data)
    }

    fn current_size(&self) -> u64 {
        (**self).current_size()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
