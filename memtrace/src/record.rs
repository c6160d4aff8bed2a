// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::TraceError;
use serde::{Deserialize, Serialize};

/// Magic string carried by every header frame.
pub const TRACE_MAGIC: &str = "feedcafedeadbeef";
pub const MAJOR_VERSION: u32 = 1;
pub const MINOR_VERSION: u32 = 0;

/// Frame kind tag.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceType {
    Begin = 1,
    Io = 15,
    MemtableInsert = 32,
    MemtableLookup = 33,
}

impl TryFrom<u8> for TraceType {
    type Error = TraceError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(TraceType::Begin),
            15 => Ok(TraceType::Io),
            32 => Ok(TraceType::MemtableInsert),
            33 => Ok(TraceType::MemtableLookup),
            _ => Err(TraceError::Aborted("unrecognized trace type".to_owned())),
        }
    }
}

impl From<TraceType> for u8 {
    fn from(kind: TraceType) -> u8 {
        kind as u8
    }
}

/// First frame of every trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub start_time: u64,
    pub format_major: u32,
    pub format_minor: u32,
}

impl TraceHeader {
    /// A header for the current format version.
    pub fn new(start_time: u64) -> Self {
        TraceHeader {
            start_time,
            format_major: MAJOR_VERSION,
            format_minor: MINOR_VERSION,
        }
    }
}

/// Memtable operation reported by a producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Insert,
    Lookup,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Lookup => "lookup",
        }
    }
}

/// One I/O call observed by the storage engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRecord {
    pub timestamp: u64,
    pub file_operation: String,
    pub latency: u64,
    pub io_status: String,
    pub file_name: String,
    pub file_size: Option<u64>,
    pub len: Option<u64>,
    pub offset: Option<u64>,
    pub request_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceRecord {
    Insert {
        timestamp: u64,
        entity_id: u64,
        sequence_number: u64,
        key: Vec<u8>,
        value: Vec<u8>,
        key_size: u32,
        value_size: u32,
    },
    Lookup {
        timestamp: u64,
        entity_id: u64,
        sequence_number: u64,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Io(IoRecord),
}

impl TraceRecord {
    /// Builds a memtable record, taking insert sizes from the key and value.
    pub fn memtable(
        op: OpKind,
        timestamp: u64,
        entity_id: u64,
        sequence_number: u64,
        key: &[u8],
        value: &[u8],
    ) -> Self {
        match op {
            OpKind::Insert => TraceRecord::Insert {
                timestamp,
                entity_id,
                sequence_number,
                key: key.to_vec(),
                value: value.to_vec(),
                key_size: saturating_u32(key.len()),
                value_size: saturating_u32(value.len()),
            },
            OpKind::Lookup => TraceRecord::Lookup {
                timestamp,
                entity_id,
                sequence_number,
                key: key.to_vec(),
                value: value.to_vec(),
            },
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            TraceRecord::Insert { timestamp, .. } | TraceRecord::Lookup { timestamp, .. } => {
                *timestamp
            }
            TraceRecord::Io(io) => io.timestamp,
        }
    }

    pub fn trace_type(&self) -> TraceType {
        match self {
            TraceRecord::Insert { .. } => TraceType::MemtableInsert,
            TraceRecord::Lookup { .. } => TraceType::MemtableLookup,
            TraceRecord::Io(_) => TraceType::Io,
        }
    }

    /// The memtable operation, `None` for I/O records.
    pub fn op_kind(&self) -> Option<OpKind> {
        match self {
            TraceRecord::Insert { .. } => Some(OpKind::Insert),
            TraceRecord::Lookup { .. } => Some(OpKind::Lookup),
            TraceRecord::Io(_) => None,
        }
    }

    pub fn entity_id(&self) -> Option<u64> {
        match self {
            TraceRecord::Insert { entity_id, .. } | TraceRecord::Lookup { entity_id, .. } => {
                Some(*entity_id)
            }
            TraceRecord::Io(_) => None,
        }
    }

    pub fn key(&self) -> Option<&[u8]> {
        match self {
            TraceRecord::Insert { key, .. } | TraceRecord::Lookup { key, .. } => Some(key),
            TraceRecord::Io(_) => None,
        }
    }
}

fn saturating_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
