//! Start, wait and stop semantics of the `Supervisor`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use seatwatch_core::error::CoreError;
use seatwatch_core::memory::MemoryStore;
use seatwatch_core::zone::Zone;
use seatwatch_worker::config::{RtspConfig, SupervisorConfig, WorkerConfig};
use seatwatch_worker::detector::Detector;
use seatwatch_worker::supervisor::{ChannelOutcome, Supervisor};
use tokio::time::{sleep, Instant};

use common::*;

fn three_channel_zones() -> Vec<Zone> {
    vec![
        zone("A1", 1, 0.0, 0.0, 100.0, 100.0),
        zone("B1", 2, 0.0, 0.0, 100.0, 100.0),
        zone("C1", 3, 0.0, 0.0, 100.0, 100.0),
    ]
}

fn supervisor(
    store: &Arc<MemoryStore>,
    source: &Arc<ScriptedSource>,
    detector: Arc<dyn Detector>,
) -> Supervisor {
    Supervisor::new(
        deps(store, source, detector),
        WorkerConfig::default(),
        RtspConfig::default(),
        SupervisorConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn default_start_covers_channels_with_zones() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));

    let started_at = Instant::now();
    let started = supervisor.start(STORE_ID, None).await.unwrap();

    assert_eq!(started, vec![1, 2, 3]);
    // One stagger between each pair of starts.
    assert_eq!(started_at.elapsed(), Duration::from_secs(2));
    assert_eq!(store.zone_loads(), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(supervisor.running_channels(), vec![1, 2, 3]);

    supervisor.stop().await;
    let report = supervisor.report();
    assert_eq!(report.outcomes.len(), 3);
    for outcome in report.outcomes.values() {
        assert_matches!(outcome, ChannelOutcome::Stopped { .. });
    }
    assert_eq!(report.exit_code(), 0);
    assert!(supervisor.running_channels().is_empty());

    let stopped = messages(&store)
        .into_iter()
        .filter(|m| m == "Worker stopped")
        .count();
    assert_eq!(stopped, 3);
}

#[tokio::test(start_paused = true)]
async fn stop_aborts_a_worker_stuck_past_the_grace_period() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let detector = Arc::new(FaultyDetector {
        channel_id: 3,
        fault: Fault::Hang,
    });
    let mut supervisor = supervisor(&store, &source, detector);

    supervisor.start(STORE_ID, Some(&[1, 2, 3][..])).await.unwrap();
    sleep(Duration::from_secs(5)).await;

    let stop_started = Instant::now();
    supervisor.stop().await;
    assert_eq!(stop_started.elapsed(), Duration::from_secs(10));

    let report = supervisor.report();
    assert_matches!(report.outcomes[&1], ChannelOutcome::Stopped { .. });
    assert_matches!(report.outcomes[&2], ChannelOutcome::Stopped { .. });
    assert_eq!(report.outcomes[&3], ChannelOutcome::Aborted);
}

#[tokio::test(start_paused = true)]
async fn requested_channel_without_zones_is_reported() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));

    let started = supervisor.start(STORE_ID, Some(&[9, 1][..])).await.unwrap();
    assert_eq!(started, vec![1]);

    supervisor.stop().await;
    let report = supervisor.report();
    assert_matches!(report.outcomes[&9], ChannelOutcome::Misconfigured(_));
    assert_eq!(report.misconfigured_channels(), vec![9]);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn unknown_store_starts_nothing() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));

    assert_matches!(
        supervisor.start("nowhere", None).await,
        Err(CoreError::Configuration(_))
    );
    assert!(supervisor.running_channels().is_empty());
    assert!(source.attempts().is_empty());
}

#[tokio::test]
async fn no_startable_channel_is_a_configuration_error() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));

    assert_matches!(
        supervisor.start(STORE_ID, Some(&[7, 8][..])).await,
        Err(CoreError::Configuration(_))
    );
    assert_eq!(supervisor.report().misconfigured_channels(), vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn wait_stops_workers_on_interrupt() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));
    supervisor.start(STORE_ID, None).await.unwrap();

    let report = supervisor.wait(sleep(Duration::from_secs(30))).await;

    assert_eq!(report.outcomes.len(), 3);
    for outcome in report.outcomes.values() {
        assert_matches!(outcome, ChannelOutcome::Stopped { frames_processed } if *frames_processed > 0);
    }
}

#[tokio::test(start_paused = true)]
async fn wait_returns_once_every_worker_has_failed() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    source.script_opens(&[false; 6]);
    let mut supervisor = supervisor(&store, &source, ScriptedDetector::new(Vec::new()));
    supervisor.start(STORE_ID, None).await.unwrap();

    let report = supervisor.wait(std::future::pending()).await;

    for outcome in report.outcomes.values() {
        assert_matches!(outcome, ChannelOutcome::Fatal(_));
    }
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_worker_does_not_affect_siblings() {
    let store = store_with(three_channel_zones());
    let source = ScriptedSource::new();
    let detector = Arc::new(FaultyDetector {
        channel_id: 2,
        fault: Fault::Panic,
    });
    let mut supervisor = supervisor(&store, &source, detector);
    supervisor.start(STORE_ID, None).await.unwrap();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(supervisor.running_channels(), vec![1, 3]);

    let report = supervisor.wait(sleep(Duration::from_secs(5))).await;
    assert_matches!(report.outcomes[&2], ChannelOutcome::Panicked(_));
    assert_matches!(report.outcomes[&1], ChannelOutcome::Stopped { .. });
    assert_matches!(report.outcomes[&3], ChannelOutcome::Stopped { .. });
}
