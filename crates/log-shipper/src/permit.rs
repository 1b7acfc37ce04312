// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Returned when the wait queue of a [`FlushPermit`] is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFull {
    pub(crate) capacity: usize,
}

/// Single-slot permit with a bounded number of waiters.
///
/// Waiters are served in arrival order (tokio's semaphore is fair), so the order
/// in which flushes acquire the permit is the order in which they send.
#[derive(Debug)]
pub(crate) struct FlushPermit {
    semaphore: Semaphore,
    waiting: AtomicUsize,
    capacity: usize,
}

/// Decrements the waiter count when the acquiring future completes or is dropped.
struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl FlushPermit {
    pub(crate) fn new(capacity: usize) -> Self {
        FlushPermit {
            semaphore: Semaphore::new(1),
            waiting: AtomicUsize::new(0),
            capacity,
        }
    }

    pub(crate) async fn acquire(&self) -> Result<SemaphorePermit<'_>, QueueFull> {
        if let Ok(permit) = self.semaphore.try_acquire() {
            return Ok(permit);
        }

        let queued = self.waiting.fetch_add(1, Ordering::AcqRel);
        let _waiting = Waiting(&self.waiting);
        if queued >= self.capacity {
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }

        // The semaphore is never closed.
        self.semaphore.acquire().await.map_err(|_| QueueFull {
            capacity: self.capacity,
        })
    }

    /// Number of callers currently waiting for the permit.
    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }
}
