// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::GatedSink;
use log_shipper::{
    constants::{EVENT_OVERHEAD_BYTES, MAX_BATCH_RECORDS, MAX_BATCH_SIZE_BYTES},
    in_memory::{SinkCall, SinkOperation},
    Consumer, ConsumerOptions, FlushError, InMemorySink, Limits, LogSink,
};
use std::sync::Arc;

const GROUP: &str = "/app/worker";
const STREAM: &str = "worker-7";

fn options() -> ConsumerOptions {
    ConsumerOptions::new("us-east-1", GROUP, STREAM)
}

fn messages(events: &[log_shipper::Entry]) -> Vec<String> {
    events.iter().map(|e| e.message.clone()).collect()
}

fn put_events_calls(sink: &InMemorySink) -> Vec<(Vec<String>, Option<String>)> {
    sink.calls()
        .into_iter()
        .filter_map(|call| match call {
            SinkCall::PutEvents {
                events,
                sequence_token,
                ..
            } => Some((messages(&events), sequence_token)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_sends_buffered_lines_in_order() {
    let sink = Arc::new(InMemorySink::new());
    let consumer = Consumer::new(sink.clone() as Arc<dyn LogSink>, options()).unwrap();

    for line in ["line-0001", "line-0002", "line-0003"] {
        consumer.accept(line).await.unwrap();
    }
    assert_eq!(consumer.buffered_bytes(), 3 * (9 + EVENT_OVERHEAD_BYTES));
    assert_eq!(sink.call_count(SinkOperation::PutEvents), 0);

    consumer.flush().await.unwrap();

    assert_eq!(
        put_events_calls(&sink),
        vec![(
            vec![
                "line-0001".to_string(),
                "line-0002".to_string(),
                "line-0003".to_string()
            ],
            None
        )]
    );
    assert_eq!(consumer.buffered_events(), 0);
    assert_eq!(consumer.buffered_bytes(), 0);
}

#[tokio::test(start_paused = true)]
async fn record_limit_triggers_flush_without_explicit_call() {
    let sink = Arc::new(InMemorySink::new());
    let consumer = Consumer::new(sink.clone() as Arc<dyn LogSink>, options()).unwrap();

    for i in 0..MAX_BATCH_RECORDS {
        consumer.accept(&format!("event {i}")).await.unwrap();
    }
    assert_eq!(sink.call_count(SinkOperation::PutEvents), 0);

    consumer.accept("event 25000").await.unwrap();

    let stored = sink.events(GROUP, STREAM);
    assert_eq!(stored.len(), MAX_BATCH_RECORDS + 1);
    assert_eq!(stored[0].message, "event 0");
    assert_eq!(stored[MAX_BATCH_RECORDS].message, "event 25000");
    assert_eq!(consumer.buffered_events(), 0);

    consumer.accept("next batch").await.unwrap();
    assert_eq!(consumer.buffered_events(), 1);
    assert_eq!(sink.call_count(SinkOperation::PutEvents), 1);
}

#[tokio::test(start_paused = true)]
async fn size_limit_triggers_flush_on_crossing_accept() {
    let sink = Arc::new(InMemorySink::new());
    let consumer = Consumer::new(sink.clone() as Arc<dyn LogSink>, options()).unwrap();
    let line = "x".repeat(100_000);
    let per_event = line.len() + EVENT_OVERHEAD_BYTES;
    let crossing = MAX_BATCH_SIZE_BYTES / per_event + 1;

    for _ in 1..crossing {
        consumer.accept(&line).await.unwrap();
    }
    assert!(consumer.buffered_bytes() <= MAX_BATCH_SIZE_BYTES);
    assert_eq!(sink.call_count(SinkOperation::PutEvents), 0);

    consumer.accept(&line).await.unwrap();

    assert_eq!(sink.call_count(SinkOperation::PutEvents), 1);
    assert_eq!(sink.events(GROUP, STREAM).len(), crossing);
    assert_eq!(consumer.buffered_bytes(), 0);
}

#[tokio::test]
async fn provisioning_happens_once_before_first_send() {
    let sink = Arc::new(InMemorySink::new());
    let consumer = Consumer::new(sink.clone() as Arc<dyn LogSink>, options()).unwrap();

    for round in 0..3 {
        consumer.accept(&format!("round {round}")).await.unwrap();
        consumer.flush().await.unwrap();
    }

    let operations: Vec<_> = sink.calls().iter().map(SinkCall::operation).collect();
    assert_eq!(
        operations,
        vec![
            SinkOperation::CreateGroup,
            SinkOperation::CreateStream,
            SinkOperation::PutEvents,
            SinkOperation::PutEvents,
            SinkOperation::PutEvents,
        ]
    );
    assert!(consumer.is_provisioned());
}

#[tokio::test]
async fn lines_accepted_during_inflight_flush_go_to_next_batch() {
    let sink = Arc::new(GatedSink::new());
    let consumer = Arc::new(
        Consumer::new(sink.clone() as Arc<dyn LogSink>, options()).unwrap(),
    );

    consumer.accept("a").await.unwrap();
    consumer.accept("b").await.unwrap();

    let first = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move { consumer.flush().await })
    };
    sink.wait_for_send().await;

    // The first batch is already detached while its send is blocked.
    consumer.accept("c").await.unwrap();
    assert_eq!(consumer.buffered_events(), 1);

    let second = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move { consumer.flush().await })
    };
    while consumer.pending_flushes() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(consumer.buffered_events(), 0);

    sink.open(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let calls = put_events_calls(&sink.inner);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, vec!["a", "b"]);
    assert_eq!(calls[1].0, vec!["c"]);
    assert_eq!(calls[0].1, None);
    assert!(calls[1].1.is_some());
    assert_eq!(messages(&sink.inner.events(GROUP, STREAM)), vec!["a", "b", "c"]);
    assert_eq!(consumer.pending_flushes(), 0);
}

#[tokio::test]
async fn saturated_flush_queue_surfaces_resource_exhaustion() {
    let sink = Arc::new(GatedSink::new());
    let limits = Limits {
        max_pending_flushes: 1,
        ..Limits::default()
    };
    let consumer = Arc::new(
        Consumer::with_limits(sink.clone() as Arc<dyn LogSink>, options(), limits).unwrap(),
    );

    consumer.accept("in flight").await.unwrap();
    let in_flight = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move { consumer.flush().await })
    };
    sink.wait_for_send().await;

    consumer.accept("queued").await.unwrap();
    let queued = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move { consumer.flush().await })
    };
    while consumer.pending_flushes() == 0 {
        tokio::task::yield_now().await;
    }

    consumer.accept("rejected").await.unwrap();
    let err = consumer.flush().await.unwrap_err();

    match &err {
        FlushError::ResourceExhausted { capacity, dropped } => {
            assert_eq!(*capacity, 1);
            assert_eq!(messages(dropped), vec!["rejected"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    sink.open(2);
    in_flight.await.unwrap().unwrap();
    queued.await.unwrap().unwrap();
    assert_eq!(
        messages(&sink.inner.events(GROUP, STREAM)),
        vec!["in flight", "queued"]
    );
}
