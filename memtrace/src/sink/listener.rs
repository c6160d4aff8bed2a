// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperationType {
    Append,
    Pad,
    Flush,
    Close,
}

/// Describes one finished sink operation.
#[derive(Debug, Clone)]
pub struct FileOperationInfo<'a> {
    pub operation: FileOperationType,
    pub file_name: &'a str,
    /// Write offset at which the operation started.
    pub offset: u64,
    pub length: usize,
    pub duration: Duration,
    /// Error message of a failed operation.
    pub outcome: Result<(), String>,
}

/// Observer of sink file events.
///
/// Listener errors are logged by the sink and never turn into sink failures.
pub trait SinkListener: Send + Sync {
    /// Only listeners returning `true` are registered with a sink.
    fn should_be_notified_on_file_io(&self) -> bool {
        false
    }

    fn on_file_write_finish(&self, _info: &FileOperationInfo<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_file_flush_finish(&self, _info: &FileOperationInfo<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_file_close_finish(&self, _info: &FileOperationInfo<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) fn notify_all(listeners: &[Arc<dyn SinkListener>], info: &FileOperationInfo<'_>) {
    for listener in listeners {
        let result = match info.operation {
            FileOperationType::Append | FileOperationType::Pad => {
                listener.on_file_write_finish(info)
            }
            FileOperationType::Flush => listener.on_file_flush_finish(info),
            FileOperationType::Close => listener.on_file_close_finish(info),
        };
        if let Err(e) = result {
            warn!(
                file = info.file_name,
                operation = ?info.operation,
                "sink listener failed: {e:#}"
            );
        }
    }
}
