// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::clock::Clock;
use crate::codec;
use crate::options::TraceOptions;
use crate::record::{OpKind, TraceHeader, TraceRecord};
use crate::sink::TraceSink;
use crate::{Result, TraceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const TRACE_TOO_LARGE: &str = "trace file too large";

/// The single active trace of a [`Tracer`].
struct TraceWriter {
    clock: Arc<dyn Clock>,
    options: TraceOptions,
    sink: Box<dyn TraceSink>,
    // operations seen since the last captured one
    pending_ops: u64,
}

impl TraceWriter {
    fn write_header(&mut self) -> Result<()> {
        let header = TraceHeader::new(self.clock.now_micros());
        self.append(&codec::encode_header(&header)?)
    }

    /// Counts one operation and returns whether sampling drops it.
    fn skip_for_sampling(&mut self) -> bool {
        if self.options.sampling_frequency <= 1 {
            return false;
        }
        self.pending_ops += 1;
        if self.pending_ops < self.options.sampling_frequency {
            return true;
        }
        self.pending_ops = 0;
        false
    }

    fn append(&mut self, frame: &[u8]) -> Result<()> {
        let size = self.sink.current_size();
        if size.saturating_add(frame.len() as u64) > self.options.max_trace_file_size {
            return Err(TraceError::Aborted(TRACE_TOO_LARGE.to_owned()));
        }
        self.sink.append(frame)?;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.sink.close()
    }
}

/// Captures operations into at most one active trace.
///
/// All mutations go through one mutex, so frames from concurrent producers never interleave.
/// `enabled` mirrors whether a writer is installed and lets producers skip the lock while no trace
/// is running; it is only written with the mutex held.
#[derive(Default)]
pub struct Tracer {
    enabled: AtomicBool,
    writer: Mutex<Option<TraceWriter>>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TraceWriter>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_tracing(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Bytes written to the active trace, if any.
    pub fn trace_size(&self) -> Option<u64> {
        self.lock().as_ref().map(|w| w.sink.current_size())
    }

    /// Starts a trace into `sink` and writes its header.
    ///
    /// Fails with [`TraceError::Busy`] while another trace is active. If the header cannot be
    /// written the trace is not started and the error is returned.
    pub fn start_trace(
        &self,
        clock: Arc<dyn Clock>,
        options: TraceOptions,
        sink: Box<dyn TraceSink>,
    ) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Err(TraceError::Busy);
        }
        let mut writer = TraceWriter {
            clock,
            options,
            sink,
            pending_ops: 0,
        };
        if let Err(e) = writer.write_header() {
            if let Err(close_err) = writer.close() {
                debug!("closing sink after failed header write: {close_err}");
            }
            return Err(e);
        }
        *guard = Some(writer);
        self.enabled.store(true, Ordering::Release);
        debug!(?options, "trace started");
        Ok(())
    }

    /// Stops the active trace and closes its sink. A no-op when no trace is active.
    pub fn end_trace(&self) -> Result<()> {
        let mut guard = self.lock();
        let Some(writer) = guard.take() else {
            return Ok(());
        };
        self.enabled.store(false, Ordering::Release);
        let size = writer.sink.current_size();
        writer.close()?;
        debug!(size, "trace ended");
        Ok(())
    }

    /// Appends `record` to the active trace. Does nothing when no trace is active.
    pub fn write_op(&self, record: &TraceRecord) -> Result<()> {
        self.write_with(|_| codec::encode_record(record))
    }

    /// Records a memtable operation, timestamped by the trace's clock.
    pub fn notify(
        &self,
        op: OpKind,
        entity_id: u64,
        sequence_number: u64,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        self.write_with(|clock| {
            codec::encode_record(&TraceRecord::memtable(
                op,
                clock.now_micros(),
                entity_id,
                sequence_number,
                key,
                value,
            ))
        })
    }

    fn write_with(&self, encode: impl FnOnce(&dyn Clock) -> Result<Vec<u8>>) -> Result<()> {
        // a stale `false` only delays capture by one op, a stale `true` is re-checked below
        if !self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut guard = self.lock();
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };
        if writer.skip_for_sampling() {
            return Ok(());
        }
        let frame = encode(writer.clock.as_ref())?;
        match writer.append(&frame) {
            Err(TraceError::Aborted(reason)) => {
                self.enabled.store(false, Ordering::Release);
                if let Some(writer) = guard.take() {
                    let size = writer.sink.current_size();
                    warn!(size, "{reason}, stopping trace");
                    if let Err(e) = writer.close() {
                        warn!("failed to close trace sink: {e}");
                    }
                }
                Err(TraceError::Aborted(reason))
            }
            other => other,
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if let Err(e) = self.end_trace() {
            warn!("failed to end trace on drop: {e}");
        }
    }
}
