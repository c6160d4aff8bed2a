// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared memory regions for memtrace sinks.
//!
//! A [`ShmMapping`] owns exactly one mapped region and is the only party allowed to unmap it.
//! It cannot be cloned; ownership moves with the value and [`ShmMapping::take`] leaves an inert
//! mapping behind. Regions are either anonymous ([`ShmMapping::allocate`]) or addressed by a
//! [`ShmKey`] so that a companion process can attach to the same memory.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

#[cfg(not(unix))]
compile_error!("memtrace-shm only supports unix platforms");

mod key;
mod mapping;

pub use key::ShmKey;
pub use mapping::ShmMapping;
