// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Contract of the remote, append-only log-stream service.
//!
//! Implementations own the transport. The consumer only relies on the outcomes
//! described on each method; in particular it tolerates
//! [`SinkError::AlreadyExists`] while provisioning and threads the token returned
//! by [`LogSink::put_events`] into the next call.

use async_trait::async_trait;

use crate::batch::Entry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("resource already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("resource not found: {resource}")]
    ResourceNotFound { resource: String },

    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl SinkError {
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SinkError::AlreadyExists { .. })
    }
}

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Creates a log group. Fails with [`SinkError::AlreadyExists`] if it exists.
    async fn create_group(&self, group: &str) -> Result<(), SinkError>;

    /// Sets how long events in `group` are kept.
    async fn put_retention_policy(&self, group: &str, retention_in_days: u32)
        -> Result<(), SinkError>;

    /// Creates a stream inside `group`. Fails with [`SinkError::AlreadyExists`] if it exists.
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;

    /// Appends `events` to the stream, in order.
    ///
    /// `sequence_token` must be the token returned by the previous append to this
    /// stream (`None` for the first one). Returns the token for the next append.
    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[Entry],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError>;
}
