use std::{sync::Arc, time::Duration};

use queue_sim::{
    channel, Clock, MetricsCollector, OrderRecord, OrderSink, ServerPool, ServiceHint, TokioClock,
};
use rstest::rstest;
use uuid::Uuid;

use crate::{assert_duration, types::RecordingMetrics};

fn order(clock: &TokioClock, hint_ms: f64, service_cv: f64, kind: ServiceHint) -> OrderRecord {
    OrderRecord {
        order_id: Uuid::new_v4(),
        customer_label: "Charlie".to_string(),
        created_at: clock.now(),
        amount: 9.99,
        service_delay_hint: hint_ms,
        service_cv,
        service_hint_kind: kind,
    }
}

/// Given a pool of two servers
/// When three long orders arrive together
/// Then two are processed at once and the third waits for a free server
#[tokio::test]
async fn at_most_server_count_in_service() {
    tokio::time::pause();

    let clock = Arc::new(TokioClock::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let (sink, stream) = channel(8);

    let servers = ServerPool::builder()
        .server_count(2)
        .stream(stream)
        .metrics(metrics.clone())
        .clock(clock.clone())
        .build()
        .spawn();

    for _ in 0..3 {
        sink.publish(order(&clock, 1_000.0, 0.0, ServiceHint::Sampled))
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(metrics.processing.lock().unwrap().len(), 2);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(metrics.processing.lock().unwrap().len(), 3);

    servers.shut_down();
    servers.wait_for_shutdown().await;

    assert_eq!(*metrics.concurrency.lock().unwrap(), 2);

    let waits = metrics.waits.lock().unwrap().clone();
    assert_duration!(waits[0], Duration::from_millis(1_000), Duration::from_millis(1));
    assert_duration!(waits[1], Duration::from_millis(1_000), Duration::from_millis(1));
    // Queued for one full service time first.
    assert_duration!(waits[2], Duration::from_millis(2_000), Duration::from_millis(2));

    for processing in metrics.processing.lock().unwrap().iter() {
        assert_duration!(*processing, Duration::from_millis(1_000), Duration::from_millis(1));
    }
}

/// Given a single server receiving orders faster than it can serve them
/// When the loops run
/// Then every order waits longer than the last
#[tokio::test]
async fn waits_grow_when_overloaded() {
    tokio::time::pause();

    let clock = Arc::new(TokioClock::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let (sink, stream) = channel(64);

    let servers = ServerPool::builder()
        .stream(stream)
        .metrics(metrics.clone())
        .clock(clock.clone())
        .build()
        .spawn();

    for _ in 0..10 {
        sink.publish(order(&clock, 150.0, 0.0, ServiceHint::Sampled))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    servers.shut_down();
    servers.wait_for_shutdown().await;

    let waits = metrics.waits.lock().unwrap().clone();
    assert_eq!(waits.len(), 10);
    assert!(waits.windows(2).all(|pair| pair[1] > pair[0]), "waits: {waits:?}");

    // Each order queues 50ms longer than the one before it.
    assert_duration!(waits[9], Duration::from_millis(150 + 9 * 50), Duration::from_millis(10));
}

/// Given orders whose hint is only the mean
/// When they are processed
/// Then each consumer draws its own service time around that mean
#[rstest]
#[tokio::test]
async fn mean_hints_are_resampled(#[values(0.5, 1.0)] service_cv: f64) {
    tokio::time::pause();

    let clock = Arc::new(TokioClock::new());
    let metrics = Arc::new(MetricsCollector::new());
    let (sink, stream) = channel(4_096);

    let servers = ServerPool::builder()
        .server_count(64)
        .stream(stream)
        .metrics(metrics.clone())
        .clock(clock.clone())
        .seed(5)
        .build()
        .spawn();

    let n = 2_000;
    for _ in 0..n {
        sink.publish(order(&clock, 100.0, service_cv, ServiceHint::Mean))
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_secs(60)).await;
    servers.shut_down();
    servers.wait_for_shutdown().await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.processed, n);

    let summary = snapshot.processing.summary();
    let mean_ms = summary.mean.as_secs_f64() * 1000.0;
    // ms rounding of each sleep adds up to 1ms.
    let tolerance = 5.0 * 100.0 * service_cv / (n as f64).sqrt() + 1.0;
    assert!(
        (mean_ms - 100.0).abs() < tolerance,
        "mean = {mean_ms}ms, tolerance = {tolerance}ms"
    );
    assert!(summary.max > Duration::from_millis(101));
}

/// Given queued orders created with different service parameters
/// When one server processes them
/// Then each uses the parameters it carries rather than any shared configuration
#[tokio::test]
async fn orders_carry_their_own_parameters() {
    tokio::time::pause();

    let clock = Arc::new(TokioClock::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let (sink, stream) = channel(8);

    sink.publish(order(&clock, 300.0, 0.0, ServiceHint::Mean))
        .await
        .unwrap();
    sink.publish(order(&clock, 20.0, 0.0, ServiceHint::Sampled))
        .await
        .unwrap();

    let servers = ServerPool::builder()
        .stream(stream)
        .metrics(metrics.clone())
        .clock(clock)
        .build()
        .spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    servers.shut_down();
    servers.wait_for_shutdown().await;

    let processing = metrics.processing.lock().unwrap().clone();
    assert_eq!(processing.len(), 2);
    assert_duration!(processing[0], Duration::from_millis(300), Duration::from_millis(1));
    assert_duration!(processing[1], Duration::from_millis(20), Duration::from_millis(1));
}
