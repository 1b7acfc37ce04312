// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits of the remote log-stream sink.
//!
//! The sink accepts a bounded number of events per append call and a bounded
//! payload, where each event is charged its UTF-8 message length plus a fixed
//! framing overhead. A batch is shipped as soon as it crosses either bound or
//! becomes stale.

use std::time::Duration;

/// Maximum number of events held before a flush is forced.
///
/// The predicate is strict: the flush fires once the batch holds more than
/// this many events.
pub const MAX_BATCH_RECORDS: usize = 25_000;

/// Maximum accounted payload size in bytes (8000 KB) before a flush is forced.
pub const MAX_BATCH_SIZE_BYTES: usize = 1024 * 8000;

/// Maximum time since the last successful flush before the next accepted line
/// forces a flush.
pub const MAX_FLUSH_DELAY: Duration = Duration::from_millis(5000);

/// Per-event framing cost the sink adds on top of the message bytes.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Number of flushes allowed to wait for the send permit at the same time.
pub const MAX_PENDING_FLUSHES: usize = 512;

/// Retention periods, in days, the sink accepts for a group.
pub const RETENTION_DAYS: [u32; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Upper bound on group and stream name length.
pub const MAX_NAME_LENGTH: usize = 512;
