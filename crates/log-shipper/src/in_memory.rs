// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process [`LogSink`] that follows the remote service's semantics.
//!
//! Groups and streams must be created before events can be appended, repeated
//! creation fails with [`SinkError::AlreadyExists`], and every append must present
//! the token issued by the previous one. Every call is recorded in order, and a
//! failure can be injected for the next call of a given operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::batch::Entry;
use crate::sink::{LogSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkOperation {
    CreateGroup,
    PutRetentionPolicy,
    CreateStream,
    PutEvents,
}

/// A call received by the sink, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    CreateGroup {
        group: String,
    },
    PutRetentionPolicy {
        group: String,
        retention_in_days: u32,
    },
    CreateStream {
        group: String,
        stream: String,
    },
    PutEvents {
        group: String,
        stream: String,
        events: Vec<Entry>,
        sequence_token: Option<String>,
    },
}

impl SinkCall {
    #[must_use]
    pub fn operation(&self) -> SinkOperation {
        match self {
            SinkCall::CreateGroup { .. } => SinkOperation::CreateGroup,
            SinkCall::PutRetentionPolicy { .. } => SinkOperation::PutRetentionPolicy,
            SinkCall::CreateStream { .. } => SinkOperation::CreateStream,
            SinkCall::PutEvents { .. } => SinkOperation::PutEvents,
        }
    }
}

#[derive(Debug, Default)]
struct StreamLog {
    events: Vec<Entry>,
    appends: u64,
    upload_token: Option<String>,
}

#[derive(Debug, Default)]
struct GroupState {
    retention_in_days: Option<u32>,
    streams: HashMap<String, StreamLog>,
}

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<String, GroupState>,
    calls: Vec<SinkCall>,
    failures: HashMap<SinkOperation, SinkError>,
}

impl Inner {
    fn stream_mut(&mut self, group: &str, stream: &str) -> Result<&mut StreamLog, SinkError> {
        self.groups
            .get_mut(group)
            .ok_or_else(|| SinkError::ResourceNotFound {
                resource: group.to_string(),
            })?
            .streams
            .get_mut(stream)
            .ok_or_else(|| SinkError::ResourceNotFound {
                resource: format!("{group}/{stream}"),
            })
    }
}

#[derive(Debug, Default)]
pub struct InMemorySink {
    inner: Mutex<Inner>,
}

impl InMemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink where `group/stream` already exists, as if provisioned by
    /// another writer.
    #[must_use]
    pub fn with_existing_stream(group: &str, stream: &str) -> Self {
        let sink = Self::new();
        sink.lock()
            .groups
            .entry(group.to_string())
            .or_default()
            .streams
            .insert(stream.to_string(), StreamLog::default());
        sink
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: SinkOperation, error: SinkError) {
        self.lock().failures.insert(operation, error);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn call_count(&self, operation: SinkOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Events stored in `group/stream`, in append order.
    #[must_use]
    pub fn events(&self, group: &str, stream: &str) -> Vec<Entry> {
        self.lock()
            .groups
            .get(group)
            .and_then(|g| g.streams.get(stream))
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn retention_in_days(&self, group: &str) -> Option<u32> {
        self.lock()
            .groups
            .get(group)
            .and_then(|g| g.retention_in_days)
    }

    #[must_use]
    pub fn has_stream(&self, group: &str, stream: &str) -> bool {
        self.lock()
            .groups
            .get(group)
            .is_some_and(|g| g.streams.contains_key(stream))
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock poisoned")
    }

    /// Records `call` and returns the injected failure for its operation, if any.
    fn record(inner: &mut Inner, call: SinkCall) -> Result<(), SinkError> {
        let operation = call.operation();
        inner.calls.push(call);
        match inner.failures.remove(&operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LogSink for InMemorySink {
    async fn create_group(&self, group: &str) -> Result<(), SinkError> {
        let mut inner = self.lock();
        Self::record(
            &mut inner,
            SinkCall::CreateGroup {
                group: group.to_string(),
            },
        )?;

        if inner.groups.contains_key(group) {
            return Err(SinkError::AlreadyExists {
                resource: group.to_string(),
            });
        }
        inner.groups.insert(group.to_string(), GroupState::default());
        Ok(())
    }

    async fn put_retention_policy(
        &self,
        group: &str,
        retention_in_days: u32,
    ) -> Result<(), SinkError> {
        let mut inner = self.lock();
        Self::record(
            &mut inner,
            SinkCall::PutRetentionPolicy {
                group: group.to_string(),
                retention_in_days,
            },
        )?;

        let state = inner
            .groups
            .get_mut(group)
            .ok_or_else(|| SinkError::ResourceNotFound {
                resource: group.to_string(),
            })?;
        state.retention_in_days = Some(retention_in_days);
        Ok(())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        let mut inner = self.lock();
        Self::record(
            &mut inner,
            SinkCall::CreateStream {
                group: group.to_string(),
                stream: stream.to_string(),
            },
        )?;

        let state = inner
            .groups
            .get_mut(group)
            .ok_or_else(|| SinkError::ResourceNotFound {
                resource: group.to_string(),
            })?;
        if state.streams.contains_key(stream) {
            return Err(SinkError::AlreadyExists {
                resource: format!("{group}/{stream}"),
            });
        }
        state.streams.insert(stream.to_string(), StreamLog::default());
        Ok(())
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[Entry],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        let mut inner = self.lock();
        Self::record(
            &mut inner,
            SinkCall::PutEvents {
                group: group.to_string(),
                stream: stream.to_string(),
                events: events.to_vec(),
                sequence_token: sequence_token.map(str::to_string),
            },
        )?;

        if events.is_empty() {
            return Err(SinkError::Rejected("batch contains no events".to_string()));
        }

        let log = inner.stream_mut(group, stream)?;
        if log.upload_token.as_deref() != sequence_token {
            return Err(SinkError::InvalidSequenceToken {
                expected: log.upload_token.clone(),
            });
        }

        log.events.extend_from_slice(events);
        log.appends += 1;
        log.upload_token = Some(format!("{:020}", log.appends));
        Ok(log.upload_token.clone())
    }
}
