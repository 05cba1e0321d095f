//! End-to-end pipeline execution tests.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use rill_core::{
    connect, nodes, run, run_with_env, wait, BoxedNode, Chain, Env, Node, NodeState,
    PipelineError,
};

/// Hang guard: nothing in this suite legitimately takes this long.
const TICK: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_noop_node_completes_cleanly() {
    let noop: Node<(), ()> = Node::new(|_ctx| async { Ok(()) });
    let reports = run(CancellationToken::new(), [BoxedNode::from(noop)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_values_flow_through_a_three_stage_chain_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);

    let numbers = nodes::source_iter(3i64..6);
    let pass = nodes::map(|n: i64| Ok(n));
    let collect = nodes::each(move |n: i64| {
        sink_seen.lock().unwrap().push(n);
        Ok(())
    });

    let reports = Chain::start(numbers)
        .then(pass)
        .then(collect)
        .run(CancellationToken::new());
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert!(outcome.is_ok());

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, [3, 4, 5]);
    assert_eq!(seen.iter().sum::<i64>(), 12);
}

#[tokio::test]
async fn test_fifo_order_is_preserved_under_load() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);

    let source = nodes::source_iter(0..512);
    let collect = nodes::each(move |n: i32| {
        sink_seen.lock().unwrap().push(n);
        Ok(())
    });

    let reports = Chain::start(source).then(collect).run(CancellationToken::new());
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
    assert_eq!(*seen.lock().unwrap(), (0..512).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_consumer_sees_end_of_stream_exactly_once() {
    let mut producer: Node<(), i32> = Node::new(|ctx| async move {
        assert!(ctx.send(1).await);
        assert!(ctx.send(2).await);
        Ok(())
    });
    let mut consumer: Node<i32, ()> = Node::new(|mut ctx| async move {
        assert_eq!(ctx.recv().await, Some(1));
        assert_eq!(ctx.recv().await, Some(2));
        assert_eq!(ctx.recv().await, None);
        // End-of-stream stays quiescent; no duplicate wake, no hang.
        assert_eq!(ctx.recv().await, None);
        Ok(())
    });
    connect(&mut producer, &mut consumer);

    let reports = run(
        CancellationToken::new(),
        [BoxedNode::from(producer), BoxedNode::from(consumer)],
    );
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
}

#[tokio::test]
async fn test_sends_after_the_consumer_terminates_are_rejected() {
    let rejected = Arc::new(AtomicU64::new(0));
    let producer_rejected = Arc::clone(&rejected);

    let mut producer: Node<(), i32> = Node::new(move |ctx| async move {
        let mut n = 0;
        while ctx.send(n).await {
            n += 1;
        }
        // Every subsequent attempt is rejected too, immediately.
        for m in 0..3 {
            assert!(!ctx.send(m).await);
            producer_rejected.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    });
    let mut consumer: Node<i32, ()> = Node::new(|mut ctx| async move {
        assert_eq!(ctx.recv().await, Some(0));
        Ok(())
    });
    connect(&mut producer, &mut consumer);

    let reports = run(
        CancellationToken::new(),
        [BoxedNode::from(producer), BoxedNode::from(consumer)],
    );
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
    assert_eq!(rejected.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn test_cancellation_unblocks_a_pending_send() {
    let token = CancellationToken::new();

    let mut producer: Node<(), i32> = Node::new(|ctx| async move {
        // The first send parks in the hand-off slot; nobody drains it.
        assert!(ctx.send(1).await);
        // The second pends until cancellation fires.
        assert!(!ctx.send(2).await);
        Ok(())
    });
    let mut consumer: Node<i32, ()> = Node::new(|ctx| async move {
        ctx.cancelled().await;
        Ok(())
    });
    connect(&mut producer, &mut consumer);

    let reports = run(
        token.clone(),
        [BoxedNode::from(producer), BoxedNode::from(consumer)],
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert!(matches!(outcome, Err(PipelineError::Cancelled)));
}

#[tokio::test]
async fn test_pre_cancelled_run_degrades_send_recv_and_reports_cancellation() {
    let token = CancellationToken::new();
    token.cancel();

    let node: Node<(), ()> = Node::new(|mut ctx| async move {
        assert!(!ctx.send(()).await);
        assert!(ctx.recv().await.is_none());
        assert!(ctx.is_cancelled());
        Ok(())
    });

    let reports = run(token, [BoxedNode::from(node)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert!(matches!(outcome, Err(PipelineError::Cancelled)));
}

#[tokio::test]
async fn test_single_failing_node_reports_with_its_index() {
    let failing: Node<(), ()> = Node::new(|_ctx| async { Err("oh no!".into()) });
    let reports = run(CancellationToken::new(), [BoxedNode::from(failing)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "node #1: exited with error: oh no!"
    );
}

#[tokio::test]
async fn test_named_node_reports_with_its_name() {
    let failing: Node<(), ()> =
        Node::new(|_ctx| async { Err("oh no!".into()) }).with_name("hello");
    let reports = run(CancellationToken::new(), [BoxedNode::from(failing)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "node hello: exited with error: oh no!"
    );
}

#[tokio::test]
async fn test_reported_diagnostics_keep_the_handler_running() {
    let node: Node<(), ()> = Node::new(|ctx| async move {
        assert!(ctx.report("well damn").await);
        Ok(())
    });
    let reports = run(CancellationToken::new(), [BoxedNode::from(node)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(outcome.unwrap_err().to_string(), "node #1: well damn");
}

#[tokio::test]
async fn test_two_failures_aggregate_in_arrival_order() {
    let first: Node<(), ()> = Node::new(|_ctx| async { Err("first".into()) });
    let second: Node<(), ()> = Node::new(|_ctx| async {
        // Stagger so arrival order is deterministic.
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err("second".into())
    });

    let reports = run(
        CancellationToken::new(),
        [BoxedNode::from(first), BoxedNode::from(second)],
    );
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    match outcome.unwrap_err() {
        PipelineError::Aggregate(drained) => {
            assert_eq!(drained.len(), 2);
            assert_eq!(
                drained[0].to_string(),
                "node #1: exited with error: first"
            );
            assert_eq!(
                drained[1].to_string(),
                "node #2: exited with error: second"
            );
        }
        other => panic!("expected an aggregate, got: {other}"),
    }
}

#[tokio::test]
async fn test_sibling_nodes_finish_after_one_fails() {
    let mut producer: Node<(), i32> = Node::new(|ctx| async move {
        for n in 0..10 {
            if !ctx.send(n).await {
                break;
            }
        }
        Ok(())
    });
    let mut consumer: Node<i32, ()> = Node::new(|mut ctx| async move {
        // Fail after the first value; the producer must still wind
        // down on its own and the run must still terminate.
        let _ = ctx.recv().await;
        Err("sink gave up".into())
    });
    connect(&mut producer, &mut consumer);

    let reports = run(
        CancellationToken::new(),
        [BoxedNode::from(producer), BoxedNode::from(consumer)],
    );
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "node #2: exited with error: sink gave up"
    );
}

#[tokio::test]
async fn test_guarded_panic_becomes_an_error_outcome() {
    let node: Node<(), ()> = Node::new(|_ctx| async { panic!("boom") }).catch_panics();
    let reports = run(CancellationToken::new(), [BoxedNode::from(node)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "node #1: exited with error: panic: boom"
    );
}

#[tokio::test]
async fn test_panic_translator_sees_the_payload() {
    let node: Node<(), ()> = Node::new(|_ctx| async { panic!("kaboom") })
        .catch_panics_with(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("unknown");
            format!("translated: {message}").into()
        });
    let reports = run(CancellationToken::new(), [BoxedNode::from(node)]);
    let outcome = timeout(TICK, wait(reports)).await.expect("run hung");
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "node #1: exited with error: translated: kaboom"
    );
}

#[tokio::test]
async fn test_handlers_read_run_scoped_values() {
    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    let node: Node<(), ()> = Node::new(|ctx| async move {
        assert_eq!(ctx.get::<Greeting>().0, "aragorn");
        Ok(())
    });

    let env = Env::new().with(Greeting("aragorn"));
    let reports = run_with_env(CancellationToken::new(), env, [BoxedNode::from(node)]);
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
}

#[tokio::test]
async fn test_metrics_track_node_activity() {
    let producer = nodes::source_iter(0..3);
    let producer_metrics = producer.metrics();
    let consumer = nodes::each(|_n: i32| Ok(()));
    let consumer_metrics = consumer.metrics();

    let reports = Chain::start(producer)
        .then(consumer)
        .run(CancellationToken::new());
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());

    let produced = producer_metrics.snapshot();
    assert_eq!(produced.sent, 3);
    assert_eq!(produced.state, NodeState::Done);

    let consumed = consumer_metrics.snapshot();
    assert_eq!(consumed.received, 3);
    assert_eq!(consumed.state, NodeState::Done);
}

#[tokio::test]
async fn test_filter_drops_values_without_stalling_the_chain() {
    let total = Arc::new(AtomicI64::new(0));
    let sink_total = Arc::clone(&total);

    let source = nodes::source_iter(1i64..=10);
    let evens = nodes::filter(|n: &i64| n % 2 == 0);
    let sum = nodes::each(move |n: i64| {
        sink_total.fetch_add(n, Ordering::Relaxed);
        Ok(())
    });

    let reports = Chain::start(source)
        .then(evens)
        .then(sum)
        .run(CancellationToken::new());
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
    assert_eq!(total.load(Ordering::Relaxed), 2 + 4 + 6 + 8 + 10);
}

#[tokio::test]
async fn test_reader_and_lines_split_chunked_input() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);

    // A chunk size of 4 forces lines to span chunk boundaries.
    let reader = nodes::reader_source("alpha\nbeta\r\ngamma".as_bytes(), 4);
    let splitter = nodes::lines();
    let collect = nodes::each(move |line: String| {
        sink_seen.lock().unwrap().push(line);
        Ok(())
    });

    let reports = Chain::start(reader)
        .then(splitter)
        .then(collect)
        .run(CancellationToken::new());
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());
    assert_eq!(*seen.lock().unwrap(), ["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn test_writer_sink_writes_every_chunk() {
    let (client, mut server) = tokio::io::duplex(256);

    let source = nodes::source_iter(vec![
        bytes::Bytes::from_static(b"hello "),
        bytes::Bytes::from_static(b"world"),
    ]);
    let sink = nodes::writer_sink(client);

    let reports = Chain::start(source).then(sink).run(CancellationToken::new());
    assert!(timeout(TICK, wait(reports)).await.expect("run hung").is_ok());

    let mut written = Vec::new();
    timeout(TICK, server.read_to_end(&mut written))
        .await
        .expect("read hung")
        .unwrap();
    assert_eq!(written, b"hello world");
}
