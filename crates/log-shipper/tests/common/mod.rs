// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sinks used to hold sends in flight while a test inspects the consumer.

use async_trait::async_trait;
use log_shipper::{Entry, InMemorySink, LogSink, SinkError};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Delegates to an [`InMemorySink`], but every `put_events` waits for a permit
/// released by the test through [`GatedSink::open`].
pub struct GatedSink {
    pub inner: Arc<InMemorySink>,
    gate: Semaphore,
    entered: Notify,
}

impl GatedSink {
    pub fn new() -> Self {
        GatedSink {
            inner: Arc::new(InMemorySink::new()),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Lets `sends` blocked or future `put_events` calls through.
    pub fn open(&self, sends: usize) {
        self.gate.add_permits(sends);
    }

    /// Resolves once a `put_events` call is waiting on the gate.
    pub async fn wait_for_send(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
#[allow(clippy::expect_used)]
impl LogSink for GatedSink {
    async fn create_group(&self, group: &str) -> Result<(), SinkError> {
        self.inner.create_group(group).await
    }

    async fn put_retention_policy(
        &self,
        group: &str,
        retention_in_days: u32,
    ) -> Result<(), SinkError> {
        self.inner.put_retention_policy(group, retention_in_days).await
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.inner.create_stream(group, stream).await
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[Entry],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        self.entered.notify_one();
        self.gate
            .acquire()
            .await
            .expect("gate closed")
            .forget();
        self.inner
            .put_events(group, stream, events, sequence_token)
            .await
    }
}
