// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Operation tracing for a storage engine.
//!
//! Producers report memtable inserts, lookups and I/O calls to a [`Tracer`], which encodes them
//! into a compact binary log and appends them to a [`sink::TraceSink`]. A [`TraceReader`] replays
//! such a log record by record, and the [`analyzer`] folds the replayed records into per-memtable
//! statistics and text reports.
//!
//! ```text
//! producer -> Tracer::write_op -> codec::encode_record -> TraceSink::append
//! trace log -> TraceReader -> Analyzer -> reports
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod analyzer;
pub mod clock;
pub mod codec;
pub mod coding;
mod error;
pub mod options;
pub mod reader;
pub mod record;
pub mod sink;
pub mod tracer;

pub use error::{Result, TraceError};
pub use reader::TraceReader;
pub use record::{IoRecord, OpKind, TraceHeader, TraceRecord, TraceType};
pub use tracer::Tracer;
