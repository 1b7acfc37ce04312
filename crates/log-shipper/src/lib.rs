// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching buffer that ships text lines to a remote, append-only log stream.
//!
//! A [`Consumer`] is bound to one group/stream destination. Lines pushed through
//! [`Consumer::accept`] accumulate in an in-memory batch that is flushed when it grows
//! past the record or byte limits of the sink, or when the last successful flush is
//! older than the staleness limit. Flushes are serialized by a single-slot permit so
//! that sequence tokens returned by the sink are threaded through sends in order.
//!
//! Delivery is best-effort: a batch that fails to send is handed back inside the
//! [`FlushError`] and is never re-queued.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod in_memory;
mod permit;
pub mod sink;

pub use batch::{Entry, Limits};
pub use config::ConsumerOptions;
pub use consumer::Consumer;
pub use error::{ConfigError, ConsumeError, FlushError, ProvisionStep};
pub use in_memory::InMemorySink;
pub use sink::{LogSink, SinkError};
