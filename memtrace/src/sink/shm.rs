// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace sink backed by a shared memory region.
//!
//! Region layout:
//!
//! ```text
//! 0..8     magic
//! 8..16    committed size (atomic, bytes of trace data)
//! 16..24   capacity
//! 24..64   reserved
//! 64..     trace data
//! ```
//!
//! The committed size is published after the bytes it covers are copied, so a companion
//! [`ShmRegionReader`] never observes a partially copied append.

use super::listener::{notify_all, FileOperationInfo, FileOperationType, SinkListener};
use super::TraceSink;
use crate::options::ShmSinkOptions;
use crate::reader::TraceReader;
use crate::{Result, TraceError};
use memtrace_shm::{ShmKey, ShmMapping};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const REGION_MAGIC: u64 = u64::from_le_bytes(*b"MTRCSHM1");
const HEADER_LEN: usize = 64;
const SIZE_OFFSET: usize = 8;
const CAPACITY_OFFSET: usize = 16;

const ANONYMOUS_NAME: &str = "<anonymous>";

/// Returns the atomic at `offset` of a mapped region.
///
/// # Safety
/// The mapping must be non-null, at least `offset + 8` bytes long, and `offset` a multiple of 8.
unsafe fn region_atomic(mapping: &ShmMapping, offset: usize) -> &AtomicU64 {
    AtomicU64::from_ptr(mapping.as_ptr().add(offset).cast())
}

/// Lock-free view of a sink's size counter.
#[derive(Debug, Clone)]
pub struct SizeMonitor(Arc<AtomicU64>);

impl SizeMonitor {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

pub struct ShmSink {
    name: String,
    mapping: ShmMapping,
    capacity: u64,
    size: Arc<AtomicU64>,
    checksum: Option<crc32fast::Hasher>,
    buffered_data_with_checksum: bool,
    file_checksum: Option<String>,
    listeners: Vec<Arc<dyn SinkListener>>,
    closed: bool,
}

impl ShmSink {
    pub fn new(options: &ShmSinkOptions) -> Result<Self> {
        Self::with_listeners(options, Vec::new())
    }

    /// Maps the configured region and resets it to an empty trace.
    pub fn with_listeners(
        options: &ShmSinkOptions,
        listeners: Vec<Arc<dyn SinkListener>>,
    ) -> Result<Self> {
        let capacity = usize::try_from(options.capacity).map_err(|_| {
            TraceError::ResourceExhausted(format!("capacity {} is too large", options.capacity))
        })?;
        let region_len = HEADER_LEN.checked_add(capacity).ok_or_else(|| {
            TraceError::ResourceExhausted(format!("capacity {capacity} is too large"))
        })?;

        let (name, mapping) = match &options.key {
            Some(path) => {
                let key = ShmKey::from_path(path);
                let mapping = ShmMapping::open_or_create(&key, region_len)?;
                (key.name().to_owned(), mapping)
            }
            None => (ANONYMOUS_NAME.to_owned(), ShmMapping::allocate(region_len)?),
        };

        // SAFETY: the region is at least HEADER_LEN bytes and page aligned.
        unsafe {
            region_atomic(&mapping, SIZE_OFFSET).store(0, Ordering::Release);
            region_atomic(&mapping, CAPACITY_OFFSET).store(options.capacity, Ordering::Relaxed);
            region_atomic(&mapping, 0).store(REGION_MAGIC, Ordering::Release);
        }

        debug!(
            region = %name,
            capacity = options.capacity,
            "opened shared memory trace sink"
        );

        Ok(ShmSink {
            name,
            mapping,
            capacity: options.capacity,
            size: Arc::new(AtomicU64::new(0)),
            checksum: options.file_checksum.then(crc32fast::Hasher::new),
            buffered_data_with_checksum: options.buffered_data_with_checksum,
            file_checksum: None,
            listeners: listeners
                .into_iter()
                .filter(|l| l.should_be_notified_on_file_io())
                .collect(),
            closed: false,
        })
    }

    /// Name of the backing region, as reported to listeners.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn size_monitor(&self) -> SizeMonitor {
        SizeMonitor(self.size.clone())
    }

    /// Appends `data` whose CRC32 the caller already computed.
    ///
    /// With `buffered_data_with_checksum` the fragment is combined into the file checksum
    /// without rehashing `data`.
    pub fn append_with_checksum(&mut self, data: &[u8], crc: u32) -> Result<usize> {
        self.write(data, FileOperationType::Append, Some(crc))
    }

    /// Writes `n` zero bytes, typically to align the next write to a block boundary.
    ///
    /// Padding counts toward the size but not toward the file checksum.
    pub fn pad(&mut self, n: usize) -> Result<usize> {
        let zeros = vec![0u8; n];
        self.write(&zeros, FileOperationType::Pad, None)
    }

    /// Hex CRC32 of everything appended, available once the sink is closed.
    pub fn file_checksum(&self) -> Option<&str> {
        self.file_checksum.as_deref()
    }

    pub fn file_checksum_name(&self) -> &'static str {
        if self.checksum.is_some() || self.file_checksum.is_some() {
            "Crc32"
        } else {
            "Unknown"
        }
    }

    fn write(
        &mut self,
        data: &[u8],
        operation: FileOperationType,
        crc: Option<u32>,
    ) -> Result<usize> {
        let start = Instant::now();
        let offset = self.size.load(Ordering::Acquire);
        let result = self.copy_in(offset, data, operation, crc);
        self.notify(operation, offset, data.len(), start, &result);
        result.map(|()| data.len())
    }

    fn copy_in(
        &mut self,
        offset: u64,
        data: &[u8],
        operation: FileOperationType,
        crc: Option<u32>,
    ) -> Result<()> {
        if self.closed {
            return Err(TraceError::Closed);
        }
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= self.capacity)
            .ok_or_else(|| {
                TraceError::ResourceExhausted(format!(
                    "{} bytes do not fit in {} at offset {offset} (capacity {})",
                    data.len(),
                    self.name,
                    self.capacity
                ))
            })?;

        // SAFETY: HEADER_LEN + end <= HEADER_LEN + capacity, the mapped length. Appends are
        // serialized by &mut self and never overlap bytes already published.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.mapping.as_ptr().add(HEADER_LEN + offset as usize),
                data.len(),
            );
        }

        if operation == FileOperationType::Append {
            if let Some(hasher) = self.checksum.as_mut() {
                match crc {
                    Some(crc) if self.buffered_data_with_checksum => hasher.combine(
                        &crc32fast::Hasher::new_with_initial_len(crc, data.len() as u64),
                    ),
                    _ => hasher.update(data),
                }
            }
        }

        self.size.store(end, Ordering::Release);
        // SAFETY: the mapping stays live until close, which is checked above.
        unsafe { region_atomic(&self.mapping, SIZE_OFFSET).store(end, Ordering::Release) };
        Ok(())
    }

    fn notify(
        &self,
        operation: FileOperationType,
        offset: u64,
        length: usize,
        start: Instant,
        result: &Result<()>,
    ) {
        if self.listeners.is_empty() {
            return;
        }
        let info = FileOperationInfo {
            operation,
            file_name: &self.name,
            offset,
            length,
            duration: start.elapsed(),
            outcome: result.as_ref().map(|_| ()).map_err(|e| e.to_string()),
        };
        notify_all(&self.listeners, &info);
    }
}

impl TraceSink for ShmSink {
    fn append(&mut self, data: &[u8]) -> Result<usize> {
        self.write(data, FileOperationType::Append, None)
    }

    fn current_size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(TraceError::Closed);
        }
        let start = Instant::now();
        let result = self.mapping.sync().map_err(TraceError::from);
        self.notify(FileOperationType::Flush, self.current_size(), 0, start, &result);
        result
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let start = Instant::now();
        let result = self.mapping.sync().map_err(TraceError::from);
        self.closed = true;
        if let Some(hasher) = self.checksum.take() {
            self.file_checksum = Some(format!("{:08x}", hasher.finalize()));
        }
        drop(self.mapping.take());
        self.notify(FileOperationType::Close, self.current_size(), 0, start, &result);
        debug!(region = %self.name, size = self.current_size(), "closed shared memory trace sink");
        result
    }
}

/// Read access to a keyed region written by a [`ShmSink`], usually from another process.
pub struct ShmRegionReader {
    mapping: ShmMapping,
    capacity: u64,
}

impl ShmRegionReader {
    /// Attaches to the region a sink created for the same path-like `key`.
    pub fn attach<P: AsRef<Path>>(key: P) -> Result<Self> {
        let key = ShmKey::from_path(key);
        let mapping = ShmMapping::open(&key)?;
        if mapping.len() < HEADER_LEN {
            return Err(TraceError::corruption(format!(
                "region {key} is too small for a trace header"
            )));
        }
        // SAFETY: the region is at least HEADER_LEN bytes and page aligned.
        let (magic, capacity) = unsafe {
            (
                region_atomic(&mapping, 0).load(Ordering::Acquire),
                region_atomic(&mapping, CAPACITY_OFFSET).load(Ordering::Relaxed),
            )
        };
        if magic != REGION_MAGIC {
            return Err(TraceError::corruption(format!(
                "region {key} does not hold a trace"
            )));
        }
        if capacity > (mapping.len() - HEADER_LEN) as u64 {
            return Err(TraceError::corruption(format!(
                "region {key} claims {capacity} bytes but maps {}",
                mapping.len() - HEADER_LEN
            )));
        }
        Ok(ShmRegionReader { mapping, capacity })
    }

    /// Bytes the writer has published so far.
    pub fn committed_len(&self) -> u64 {
        // SAFETY: validated in attach.
        let size = unsafe { region_atomic(&self.mapping, SIZE_OFFSET).load(Ordering::Acquire) };
        size.min(self.capacity)
    }

    /// The published trace bytes.
    pub fn data(&self) -> &[u8] {
        let len = self.committed_len() as usize;
        &self.mapping.as_slice()[HEADER_LEN..HEADER_LEN + len]
    }

    /// A reader over the bytes published at the time of the call.
    pub fn trace_reader(&self) -> TraceReader<&[u8]> {
        TraceReader::new(self.data())
    }
}
