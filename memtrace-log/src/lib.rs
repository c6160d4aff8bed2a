// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Subscriber setup for the memtrace binaries.
//!
//! Libraries in this workspace only emit through `tracing`; binaries call [`init_logger`] once.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod logger;
mod writers;

pub use logger::{
    build_subscriber, init_logger, LogEventLevel, LogTarget, LoggerConfig, LoggerError,
    LoggerGuard, LOG_ENV_VAR,
};
pub use writers::FileWriter;
