use std::{sync::Arc, time::Duration};

use chrono::DateTime;
use queue_sim::{
    ConfigurationStore, MetricsCollector, PacingLoop, QueueConfiguration, ServiceHint, TokioClock,
};
use rstest::rstest;
use tokio::time::Instant;
use tracing::Level;
use tracing_capture::{CaptureLayer, SharedStorage};
use tracing_subscriber::layer::SubscriberExt;

use crate::{
    assert_duration,
    types::{FailingSink, RecordingSink, SlowSink},
};

fn store(arrival_ms: f64, arrival_cv: f64, service_ms: f64, service_cv: f64) -> Arc<ConfigurationStore> {
    Arc::new(
        ConfigurationStore::new(QueueConfiguration {
            mean_arrival_delay_ms: arrival_ms,
            mean_service_delay_ms: service_ms,
            server_count: 1,
            arrival_cv,
            service_cv,
        })
        .unwrap(),
    )
}

/// Given no arrival variability
/// When the loop runs for a while
/// Then orders go out exactly one mean gap apart
#[tokio::test]
async fn constant_cadence() {
    tokio::time::pause();

    let sink = RecordingSink::default();
    let metrics = Arc::new(MetricsCollector::new());

    let pacing = PacingLoop::builder()
        .store(store(100.0, 0.0, 50.0, 0.0))
        .sink(sink.clone())
        .metrics(metrics.clone())
        .seed(7)
        .build()
        .spawn();

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    pacing.shut_down();
    pacing.wait_for_shutdown().await;

    // 0ms, 100ms, ..., 1000ms
    assert_eq!(sink.len(), 11);
    assert_eq!(metrics.orders_placed(), 11);

    for gap in sink.gaps() {
        assert_duration!(gap, Duration::from_millis(100), Duration::from_millis(1));
    }
}

/// Given a sink which takes some time to accept an order
/// When that time is shorter than the gap
/// Then the cadence is unchanged, because the publish time is subtracted from the sleep
#[tokio::test]
async fn slow_sink_keeps_cadence() {
    tokio::time::pause();

    let sink = SlowSink {
        delay: Duration::from_millis(30),
        inner: RecordingSink::default(),
    };

    let pacing = PacingLoop::builder()
        .store(store(100.0, 0.0, 50.0, 0.0))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .build()
        .spawn();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    pacing.shut_down();
    pacing.wait_for_shutdown().await;

    let gaps = sink.inner.gaps();
    assert!(gaps.len() >= 8, "gaps: {gaps:?}");
    for gap in gaps {
        assert_duration!(gap, Duration::from_millis(100), Duration::from_millis(1));
    }
}

/// Given a valid but enormous mean arrival delay
/// When a cycle runs
/// Then the gap saturates instead of crashing the loop
#[tokio::test]
async fn enormous_arrival_delay_saturates() {
    tokio::time::pause();

    let sink = RecordingSink::default();
    let mut pacing = PacingLoop::builder()
        .store(store(1e30, 0.0, 50.0, 0.0))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .build();

    let pace = pacing.cycle().await;

    assert_eq!(pace.interarrival, Duration::MAX);
    assert_eq!(sink.len(), 1);
    assert_eq!(pacing.stats().emitted, 1);
}

/// Given a sink slower than the gap
/// When orders are emitted
/// Then the loop goes again immediately rather than sleeping a negative time
#[tokio::test]
async fn sink_slower_than_gap() {
    tokio::time::pause();

    let sink = SlowSink {
        delay: Duration::from_millis(150),
        inner: RecordingSink::default(),
    };

    let mut pacing = PacingLoop::builder()
        .store(store(100.0, 0.0, 50.0, 0.0))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .build();

    for _ in 0..3 {
        let pace = pacing.cycle().await;

        assert_eq!(pace.interarrival, Duration::from_millis(100));
        assert_duration!(pace.elapsed, Duration::from_millis(150), Duration::from_millis(1));
        assert_eq!(pace.remaining(), Duration::ZERO);
    }

    assert_eq!(pacing.stats().emitted, 3);
}

/// Given a sink that rejects everything
/// When the loop runs
/// Then each failure is logged and the loop carries on
#[tokio::test]
async fn publish_failures_do_not_stop_the_loop() {
    tokio::time::pause();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_test_writer()
        .finish();
    let storage = SharedStorage::default();
    let subscriber = subscriber.with(CaptureLayer::new(&storage));
    let _guard = tracing::subscriber::set_default(subscriber);

    let metrics = Arc::new(MetricsCollector::new());

    let mut pacing = PacingLoop::builder()
        .store(store(100.0, 0.0, 50.0, 0.0))
        .sink(FailingSink)
        .metrics(metrics.clone())
        .build();

    for _ in 0..5 {
        let pace = pacing.cycle().await;
        tokio::time::sleep(pace.remaining()).await;
    }

    let stats = pacing.stats();
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.emitted, 0);
    assert_eq!(metrics.orders_placed(), 0);

    let storage = storage.lock();
    let warnings: Vec<_> = storage
        .all_events()
        .filter(|event| *event.metadata().level() == Level::WARN)
        .collect();

    assert_eq!(warnings.len(), 5, "should warn once per failed publish");
}

/// Given a running loop
/// When the configuration is replaced
/// Then the next cycle uses the new gap
#[tokio::test]
async fn picks_up_configuration_changes() {
    tokio::time::pause();

    let store = store(200.0, 0.0, 50.0, 0.0);
    let sink = RecordingSink::default();

    let pacing = PacingLoop::builder()
        .store(store.clone())
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .build()
        .spawn();

    // Orders at 0ms, 200ms, 400ms. The gap after 400ms is sampled before the update.
    tokio::time::sleep(Duration::from_millis(500)).await;

    store
        .update(QueueConfiguration {
            mean_arrival_delay_ms: 50.0,
            ..store.get()
        })
        .unwrap();

    // 600ms, 650ms, ..., 1000ms
    tokio::time::sleep(Duration::from_millis(520)).await;
    pacing.shut_down();
    pacing.wait_for_shutdown().await;

    let gaps = sink.gaps();
    assert_eq!(gaps.len(), 11, "gaps: {gaps:?}");

    for gap in &gaps[..3] {
        assert_duration!(*gap, Duration::from_millis(200), Duration::from_millis(1));
    }
    for gap in &gaps[3..] {
        assert_duration!(*gap, Duration::from_millis(50), Duration::from_millis(1));
    }
}

/// Given arrival variability
/// When many orders are emitted
/// Then the observed gaps average out to the configured mean
#[rstest]
#[tokio::test]
async fn variable_cadence_matches_mean(#[values(0.5, 1.0, 2.0)] arrival_cv: f64) {
    tokio::time::pause();

    let mut pacing = PacingLoop::builder()
        .store(store(100.0, arrival_cv, 50.0, 0.0))
        .sink(RecordingSink::default())
        .metrics(Arc::new(MetricsCollector::new()))
        .seed(11)
        .build();

    let n = 20_000;
    let mut total = Duration::ZERO;
    for _ in 0..n {
        total += pacing.cycle().await.interarrival;
    }

    let mean_ms = total.as_secs_f64() * 1000.0 / n as f64;
    let tolerance = 5.0 * 100.0 * arrival_cv / (n as f64).sqrt();
    assert!(
        (mean_ms - 100.0).abs() < tolerance,
        "mean = {mean_ms}ms, tolerance = {tolerance}ms"
    );
}

#[tokio::test]
async fn observed_arrival_rate() {
    tokio::time::pause();

    let pacing_store = store(250.0, 0.0, 50.0, 0.0);
    let mut pacing = PacingLoop::builder()
        .store(pacing_store)
        .sink(RecordingSink::default())
        .metrics(Arc::new(MetricsCollector::new()))
        .build();

    let start = Instant::now();
    for _ in 0..9 {
        let pace = pacing.cycle().await;
        tokio::time::sleep(pace.remaining()).await;
    }

    let stats = pacing.stats();
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_duration!(
        stats.mean_interarrival().unwrap(),
        Duration::from_millis(250),
        Duration::from_millis(1)
    );
    let rate = stats.arrival_rate().unwrap();
    assert!((rate - 4.0).abs() < 0.02, "rate = {rate}");
}

#[rstest]
#[case::sampled_without_variation(ServiceHint::Sampled, 0.0)]
#[case::mean_with_variation(ServiceHint::Mean, 1.5)]
#[case::mean_without_variation(ServiceHint::Mean, 0.0)]
#[tokio::test]
async fn hint_is_the_mean(#[case] hint_mode: ServiceHint, #[case] service_cv: f64) {
    tokio::time::pause();

    let sink = RecordingSink::default();
    let mut pacing = PacingLoop::builder()
        .store(store(10.0, 0.0, 400.0, service_cv))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .hint_mode(hint_mode)
        .build();

    for _ in 0..20 {
        pacing.cycle().await;
    }

    for order in sink.orders() {
        assert_eq!(order.service_delay_hint, 400.0);
        assert_eq!(order.service_cv, service_cv);
        assert_eq!(order.service_hint_kind, hint_mode);
    }
}

#[tokio::test]
async fn sampled_hints_vary() {
    tokio::time::pause();

    let sink = RecordingSink::default();
    let mut pacing = PacingLoop::builder()
        .store(store(10.0, 0.0, 400.0, 1.0))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .seed(3)
        .build();

    for _ in 0..20 {
        pacing.cycle().await;
    }

    let orders = sink.orders();
    assert!(orders.iter().all(|o| o.service_delay_hint >= 0.0));
    assert!(orders.iter().any(|o| o.service_delay_hint != 400.0));
    assert!(orders
        .iter()
        .all(|o| o.service_hint_kind == ServiceHint::Sampled));
}

#[tokio::test]
async fn order_fields() {
    tokio::time::pause();

    let wall = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = Arc::new(TokioClock::starting_at(wall));
    let sink = RecordingSink::default();
    let customers = vec!["Ann".to_string(), "Ben".to_string()];

    let mut pacing = PacingLoop::builder()
        .store(store(100.0, 0.0, 50.0, 0.0))
        .sink(sink.clone())
        .metrics(Arc::new(MetricsCollector::new()))
        .clock(clock)
        .customers(customers.clone())
        .build();

    for _ in 0..50 {
        let pace = pacing.cycle().await;
        tokio::time::sleep(pace.remaining()).await;
    }

    let orders = sink.orders();
    assert_eq!(orders.len(), 50);

    for (i, order) in orders.iter().enumerate() {
        assert!(customers.contains(&order.customer_label));
        assert!((0.0..100.0).contains(&order.amount));
        assert!(((order.amount * 100.0).round() - order.amount * 100.0).abs() < 1e-6);

        let offset = (order.created_at - wall).num_milliseconds();
        assert!(
            (offset - 100 * i as i64).abs() <= 1,
            "order {i} created {offset}ms after start"
        );
    }

    let mut ids: Vec<_> = orders.iter().map(|o| o.order_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn same_seed_same_orders() {
    tokio::time::pause();

    let run = |seed| async move {
        let sink = RecordingSink::default();
        let mut pacing = PacingLoop::builder()
            .store(store(100.0, 1.0, 400.0, 1.0))
            .sink(sink.clone())
            .metrics(Arc::new(MetricsCollector::new()))
            .seed(seed)
            .build();

        let mut gaps = Vec::new();
        for _ in 0..10 {
            gaps.push(pacing.cycle().await.interarrival);
        }

        let orders: Vec<_> = sink
            .orders()
            .into_iter()
            .map(|o| (o.customer_label, o.amount, o.service_delay_hint))
            .collect();

        (gaps, orders)
    };

    let first = run(99).await;
    let second = run(99).await;
    let other = run(100).await;

    assert_eq!(first, second);
    assert_ne!(first, other);
}
