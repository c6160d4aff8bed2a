// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors surfaced by the tracer, the sinks and the reader.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A frame or field ended before all of its bytes were available.
    #[error("incomplete trace: {0}")]
    Incomplete(String),

    /// The log is malformed, e.g. the header magic does not match.
    #[error("corrupted trace: {0}")]
    Corruption(String),

    /// Tracing was stopped administratively, or a record kind is unknown.
    #[error("aborted: {0}")]
    Aborted(String),

    /// A trace is already active.
    #[error("tracer is busy: a trace is already active")]
    Busy,

    /// A bounded sink has no room left for the write.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The sink was closed.
    #[error("sink is closed")]
    Closed,

    /// The API was called out of order.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraceError {
    pub(crate) fn incomplete(what: impl Into<String>) -> Self {
        TraceError::Incomplete(what.into())
    }

    pub(crate) fn corruption(what: impl Into<String>) -> Self {
        TraceError::Corruption(what.into())
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, TraceError::Incomplete(_))
    }
}
