// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching consumer bound to a single group/stream destination.
//!
//! # Flush discipline
//!
//! ```text
//!   accept(line) ──> Batch ──(eligible?)──> flush()
//!                                             │
//!                  detach batch (no permit) <─┤
//!                                             v
//!                                     acquire permit
//!                                             │
//!                               prepare_stream (first time only)
//!                                             │
//!                              put_events(batch, sequence token)
//!                                             │
//!                            store next token, stamp flushed_at
//! ```
//!
//! The batch is detached before the permit is awaited, so lines accepted while a
//! send is in flight accumulate in a fresh batch. The permit serializes the rest,
//! which keeps sequence tokens threaded from one send to the next.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::batch::{Batch, Entry, Limits};
use crate::config::ConsumerOptions;
use crate::error::{ConfigError, ConsumeError, FlushError, ProvisionStep};
use crate::permit::FlushPermit;
use crate::sink::{LogSink, SinkError};

/// State only written while holding the flush permit.
#[derive(Debug)]
struct StreamState {
    initialized: bool,
    sequence_token: Option<String>,
    flushed_at: Instant,
}

pub struct Consumer {
    sink: Arc<dyn LogSink>,
    options: ConsumerOptions,
    limits: Limits,
    batch: Mutex<Batch>,
    permit: FlushPermit,
    state: Mutex<StreamState>,
}

impl Consumer {
    /// Creates a consumer with the sink's default limits.
    pub fn new(sink: Arc<dyn LogSink>, options: ConsumerOptions) -> Result<Self, ConfigError> {
        Self::with_limits(sink, options, Limits::default())
    }

    pub fn with_limits(
        sink: Arc<dyn LogSink>,
        options: ConsumerOptions,
        limits: Limits,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Consumer {
            sink,
            options,
            limits,
            batch: Mutex::new(Batch::default()),
            permit: FlushPermit::new(limits.max_pending_flushes),
            state: Mutex::new(StreamState {
                initialized: false,
                sequence_token: None,
                flushed_at: Instant::now(),
            }),
        })
    }

    /// Queues `line` and flushes if the batch became eligible.
    ///
    /// Empty lines are ignored. The only failure is the one of the flush this call
    /// triggered.
    pub async fn accept(&self, line: &str) -> Result<(), FlushError> {
        if line.is_empty() {
            return Ok(());
        }

        let (records, size_bytes) = {
            let mut batch = self.lock_batch();
            batch.push(Entry::now(line));
            (batch.len(), batch.size_bytes())
        };
        let since_flush = self.lock_state().flushed_at.elapsed();

        if self.limits.should_flush(records, size_bytes, since_flush) {
            debug!(
                "LOGS | Batch eligible for flush: {} events, {} bytes, {} ms since last flush",
                records,
                size_bytes,
                since_flush.as_millis()
            );
            self.flush().await?;
        }
        Ok(())
    }

    /// Sends everything buffered so far, whether or not a limit was reached.
    ///
    /// Returns immediately when the buffer is empty. On failure the detached batch
    /// is returned inside the error and is not re-queued.
    pub async fn flush(&self) -> Result<(), FlushError> {
        let events = {
            let mut batch = self.lock_batch();
            if batch.is_empty() {
                return Ok(());
            }
            batch.take()
        };

        let _permit = match self.permit.acquire().await {
            Ok(permit) => permit,
            Err(full) => {
                error!(
                    "LOGS | Flush queue is full ({} waiting), dropping {} events",
                    full.capacity,
                    events.len()
                );
                return Err(FlushError::ResourceExhausted {
                    capacity: full.capacity,
                    dropped: events,
                });
            }
        };

        if let Err((step, source)) = self.prepare_stream().await {
            error!(
                "LOGS | Failed to {} {}: {}, dropping {} events",
                step,
                self.options.group,
                source,
                events.len()
            );
            return Err(FlushError::Provisioning {
                step,
                source,
                dropped: events,
            });
        }

        let sequence_token = self.lock_state().sequence_token.clone();
        debug!(
            "LOGS | Flushing {} events to {}/{}",
            events.len(),
            self.options.group,
            self.options.stream
        );

        match self
            .sink
            .put_events(
                &self.options.group,
                &self.options.stream,
                &events,
                sequence_token.as_deref(),
            )
            .await
        {
            Ok(next_token) => {
                let mut state = self.lock_state();
                state.flushed_at = Instant::now();
                state.sequence_token = next_token;
                debug!("LOGS | Flushed {} events", events.len());
                Ok(())
            }
            Err(source) => {
                error!(
                    "LOGS | Failed to put log events: {}, dropping {} events",
                    source,
                    events.len()
                );
                Err(FlushError::Send {
                    source,
                    dropped: events,
                })
            }
        }
    }

    /// Feeds every line of `reader` through [`Consumer::accept`], then flushes what is
    /// left once the reader is exhausted. Returns the number of lines accepted.
    pub async fn consume_lines<R>(&self, reader: R) -> Result<usize, ConsumeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut accepted = 0;
        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                continue;
            }
            self.accept(&line).await?;
            accepted += 1;
        }

        self.flush().await?;
        Ok(accepted)
    }

    /// Creates the group, its retention policy and the stream, once per consumer.
    ///
    /// The guard flips before any call is made, so a failed attempt is never
    /// retried by later flushes.
    async fn prepare_stream(&self) -> Result<(), (ProvisionStep, SinkError)> {
        {
            let mut state = self.lock_state();
            if state.initialized {
                return Ok(());
            }
            state.initialized = true;
        }

        let group = &self.options.group;
        let stream = &self.options.stream;

        debug!("LOGS | Creating log group {}", group);
        tolerate_existing(self.sink.create_group(group).await)
            .map_err(|e| (ProvisionStep::CreateGroup, e))?;

        if let Some(days) = self.options.retention_in_days {
            debug!("LOGS | Setting retention of {} to {} days", group, days);
            self.sink
                .put_retention_policy(group, days)
                .await
                .map_err(|e| (ProvisionStep::PutRetentionPolicy, e))?;
        }

        debug!("LOGS | Creating log stream {}/{}", group, stream);
        tolerate_existing(self.sink.create_stream(group, stream).await)
            .map_err(|e| (ProvisionStep::CreateStream, e))
    }

    #[must_use]
    pub fn options(&self) -> &ConsumerOptions {
        &self.options
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.options.group
    }

    #[must_use]
    pub fn stream(&self) -> &str {
        &self.options.stream
    }

    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Events waiting for the next flush.
    #[must_use]
    pub fn buffered_events(&self) -> usize {
        self.lock_batch().len()
    }

    /// Accounted size of the events waiting for the next flush.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.lock_batch().size_bytes()
    }

    /// Whether provisioning has been attempted.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.lock_state().initialized
    }

    /// Token that the next send will present.
    #[must_use]
    pub fn sequence_token(&self) -> Option<String> {
        self.lock_state().sequence_token.clone()
    }

    /// Flushes waiting for the one in flight.
    #[must_use]
    pub fn pending_flushes(&self) -> usize {
        self.permit.waiting()
    }

    #[allow(clippy::expect_used)]
    fn lock_batch(&self) -> MutexGuard<'_, Batch> {
        self.batch.lock().expect("lock poisoned")
    }

    #[allow(clippy::expect_used)]
    fn lock_state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().expect("lock poisoned")
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let pending = self
            .batch
            .get_mut()
            .map(|batch| batch.len())
            .unwrap_or_default();
        if pending > 0 {
            warn!(
                "LOGS | Dropping consumer for {}/{} with {} unflushed events",
                self.options.group, self.options.stream, pending
            );
        }
    }
}

fn tolerate_existing(result: Result<(), SinkError>) -> Result<(), SinkError> {
    match result {
        Err(e) if e.is_already_exists() => {
            debug!("LOGS | {}, continuing", e);
            Ok(())
        }
        other => other,
    }
}
