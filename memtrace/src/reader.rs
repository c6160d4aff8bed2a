// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::codec::{self, FRAME_METADATA_LEN};
use crate::record::{TraceHeader, TraceRecord};
use crate::{Result, TraceError};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    Records,
    Finished,
    Failed,
}

/// Sequential replay of a trace log.
///
/// [`TraceReader::read_header`] must be called once, first. Records then come out one frame at a
/// time from [`TraceReader::read_next`] or the `Iterator` impl. Any error other than a clean end
/// of log is fatal: the reader never skips ahead, and later calls keep failing.
pub struct TraceReader<R> {
    inner: R,
    state: State,
    header: Option<TraceHeader>,
    records_read: u64,
    bytes_read: u64,
}

impl TraceReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(TraceReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        TraceReader {
            inner,
            state: State::AwaitingHeader,
            header: None,
            records_read: 0,
            bytes_read: 0,
        }
    }

    pub fn header(&self) -> Option<&TraceHeader> {
        self.header.as_ref()
    }

    /// Records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Bytes of the log consumed by successfully decoded frames.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn read_header(&mut self) -> Result<TraceHeader> {
        if self.state != State::AwaitingHeader {
            return Err(TraceError::InvalidState("trace header was already read"));
        }
        let result = self.read_frame().and_then(|frame| {
            let frame = frame.ok_or_else(|| TraceError::incomplete("trace is empty"))?;
            let (header, consumed) = codec::decode_header(&frame)?;
            self.bytes_read += consumed as u64;
            Ok(header)
        });
        match result {
            Ok(header) => {
                self.header = Some(header);
                self.state = State::Records;
                Ok(header)
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Decodes the next record, or returns `None` at the end of the log.
    pub fn read_next(&mut self) -> Result<Option<TraceRecord>> {
        match self.state {
            State::AwaitingHeader => {
                return Err(TraceError::InvalidState("trace header has not been read"))
            }
            State::Failed => {
                return Err(TraceError::InvalidState("reader stopped after an error"))
            }
            State::Finished => return Ok(None),
            State::Records => {}
        }
        let result = self.read_frame().and_then(|frame| match frame {
            None => Ok(None),
            Some(frame) => {
                let (record, consumed) = codec::decode_record(&frame)?;
                self.bytes_read += consumed as u64;
                Ok(Some(record))
            }
        });
        match result {
            Ok(Some(record)) => {
                self.records_read += 1;
                Ok(Some(record))
            }
            Ok(None) => {
                self.state = State::Finished;
                Ok(None)
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Reads one whole frame, or `None` if the log ends cleanly at a frame boundary.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut metadata = [0u8; FRAME_METADATA_LEN];
        let mut filled = 0;
        while filled < FRAME_METADATA_LEN {
            match self.inner.read(&mut metadata[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < FRAME_METADATA_LEN {
            return Err(TraceError::incomplete(format!(
                "frame metadata: need {FRAME_METADATA_LEN} bytes, {filled} left"
            )));
        }

        let payload_len = LittleEndian::read_u32(&metadata[9..]) as usize;
        let mut frame = Vec::with_capacity(FRAME_METADATA_LEN + payload_len.min(1 << 20));
        frame.extend_from_slice(&metadata);
        let read = (&mut self.inner)
            .take(payload_len as u64)
            .read_to_end(&mut frame)?;
        if read < payload_len {
            return Err(TraceError::incomplete(format!(
                "frame payload: need {payload_len} bytes, {read} left"
            )));
        }
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, State::Finished | State::Failed) {
            return None;
        }
        match self.read_next() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.state = State::Failed;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for TraceReader<R> {}
