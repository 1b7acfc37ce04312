// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::batch::Entry;
use crate::sink::SinkError;

/// Errors raised while building or validating [`crate::ConsumerOptions`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Provisioning call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateGroup,
    PutRetentionPolicy,
    CreateStream,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStep::CreateGroup => write!(f, "create log group"),
            ProvisionStep::PutRetentionPolicy => write!(f, "put retention policy"),
            ProvisionStep::CreateStream => write!(f, "create log stream"),
        }
    }
}

/// A failed flush.
///
/// Delivery is best-effort: the batch detached by the failed flush is not put back
/// into the buffer. It is handed back here instead, so callers that need
/// at-least-once delivery can resubmit it.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("Failed to {step}, dropped {} events: {source}", .dropped.len())]
    Provisioning {
        step: ProvisionStep,
        source: SinkError,
        dropped: Vec<Entry>,
    },

    #[error("Failed to put log events, dropped {} events: {source}", .dropped.len())]
    Send {
        source: SinkError,
        dropped: Vec<Entry>,
    },

    #[error("Flush queue is full ({capacity} waiting), dropped {} events", .dropped.len())]
    ResourceExhausted {
        capacity: usize,
        dropped: Vec<Entry>,
    },
}

impl FlushError {
    /// Events lost by this flush, in their original order.
    #[must_use]
    pub fn dropped(&self) -> &[Entry] {
        match self {
            FlushError::Provisioning { dropped, .. }
            | FlushError::Send { dropped, .. }
            | FlushError::ResourceExhausted { dropped, .. } => dropped,
        }
    }

    #[must_use]
    pub fn into_dropped(self) -> Vec<Entry> {
        match self {
            FlushError::Provisioning { dropped, .. }
            | FlushError::Send { dropped, .. }
            | FlushError::ResourceExhausted { dropped, .. } => dropped,
        }
    }

    /// The sink failure behind this error, if any.
    #[must_use]
    pub fn sink_error(&self) -> Option<&SinkError> {
        match self {
            FlushError::Provisioning { source, .. } | FlushError::Send { source, .. } => {
                Some(source)
            }
            FlushError::ResourceExhausted { .. } => None,
        }
    }
}

/// Errors from [`crate::Consumer::consume_lines`].
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("Failed to read line: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Flush(#[from] FlushError),
}
