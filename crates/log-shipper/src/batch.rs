// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory batch of pending log events and the flush-eligibility rules.
//!
//! The batch keeps insertion order, which is also delivery order, and tracks the
//! byte cost the sink will charge for it incrementally: every event costs its
//! UTF-8 message length plus [`constants::EVENT_OVERHEAD_BYTES`].

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants;

/// A single queued log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// The accepted line, without its terminator.
    pub message: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Entry {
    /// Creates an entry stamped with the current wall-clock time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default()
            .try_into()
            .unwrap_or_default();
        Entry {
            message: message.into(),
            timestamp,
        }
    }

    /// Bytes the sink accounts for this event.
    #[must_use]
    pub fn cost(&self) -> usize {
        self.message.len() + constants::EVENT_OVERHEAD_BYTES
    }
}

/// Thresholds that decide when a batch must be flushed, and how many flushes may
/// queue up behind the one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_records: usize,
    pub max_size_bytes: usize,
    pub max_delay: Duration,
    pub max_pending_flushes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_records: constants::MAX_BATCH_RECORDS,
            max_size_bytes: constants::MAX_BATCH_SIZE_BYTES,
            max_delay: constants::MAX_FLUSH_DELAY,
            max_pending_flushes: constants::MAX_PENDING_FLUSHES,
        }
    }
}

impl Limits {
    /// Flush-eligibility: any single exceeded threshold is enough.
    ///
    /// All comparisons are strict, so a batch sitting exactly on a limit is
    /// not yet eligible.
    #[must_use]
    pub fn should_flush(&self, records: usize, size_bytes: usize, since_flush: Duration) -> bool {
        if records > self.max_records {
            return true;
        }

        if size_bytes > self.max_size_bytes {
            return true;
        }

        since_flush > self.max_delay
    }
}

/// Ordered pending events plus their running byte cost.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    entries: Vec<Entry>,
    size_bytes: usize,
}

impl Batch {
    pub(crate) fn push(&mut self, entry: Entry) {
        self.size_bytes += entry.cost();
        self.entries.push(entry);
    }

    /// Detaches every pending event, leaving an empty batch behind.
    pub(crate) fn take(&mut self) -> Vec<Entry> {
        self.size_bytes = 0;
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
