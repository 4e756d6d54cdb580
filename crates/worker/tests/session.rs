//! Connection, read-failure and reconnect behavior of `ChannelSession`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use seatwatch_core::store::{LogLevel, StateStore};
use seatwatch_worker::config::SessionConfig;
use seatwatch_worker::error::SessionError;
use seatwatch_worker::lifecycle::Lifecycle;
use seatwatch_worker::session::{ChannelSession, SessionPhase};
use seatwatch_worker::source::{FrameSource, Transport};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{channel_one_zones, messages, store_with, ScriptedSource, STORE_ID};

const URL: &str = "rtsp://admin:pw@10.0.0.5:554/live_01";

fn session(source: &Arc<ScriptedSource>) -> (ChannelSession, Arc<seatwatch_core::memory::MemoryStore>) {
    let store = store_with(channel_one_zones());
    let lifecycle = Lifecycle::for_channel(store.clone() as Arc<dyn StateStore>, STORE_ID, 1);
    let session = ChannelSession::new(
        URL,
        source.clone() as Arc<dyn FrameSource>,
        SessionConfig::default(),
        lifecycle,
    );
    (session, store)
}

#[tokio::test]
async fn connect_falls_back_to_udp() {
    let source = ScriptedSource::new();
    source.script_opens(&[false, true]);
    let (mut session, store) = session(&source);

    session.connect().await.unwrap();

    assert_eq!(source.attempts(), vec![Transport::Tcp, Transport::Udp]);
    assert_eq!(session.transport(), Some(Transport::Udp));
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert!(session.state().connected);
    assert!(session.session_id().is_some());
    assert_eq!(messages(&store), vec!["Stream open failed", "Stream connected"]);
}

#[tokio::test]
async fn connect_fails_when_every_transport_fails() {
    let source = ScriptedSource::new();
    source.script_opens(&[false, false]);
    let (mut session, store) = session(&source);

    assert_matches!(session.connect().await, Err(SessionError::Connection(_)));
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert!(!session.state().connected);

    let last = store.lifecycle().pop().unwrap();
    assert_eq!(last.message, "Stream connection failed");
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.component, "channel_1_worker");
}

#[tokio::test]
async fn transport_without_liveness_frame_is_rejected() {
    let source = ScriptedSource::new();
    source.script_reads(&[false, true]);
    let (mut session, _store) = session(&source);

    session.connect().await.unwrap();

    assert_eq!(session.transport(), Some(Transport::Udp));
    assert_eq!(session.state().frames_processed, 0);
}

#[tokio::test(start_paused = true)]
async fn ten_read_failures_force_reconnect_after_cooldown() {
    let source = ScriptedSource::new();
    source.script_reads(&[true]);
    source.script_reads(&[false; 10]);
    let (mut session, store) = session(&source);
    session.connect().await.unwrap();

    for expected in 1..10 {
        assert_matches!(session.read_frame().await, Err(SessionError::Read(_)));
        assert_eq!(session.state().consecutive_read_failures, expected);
        assert_eq!(session.phase(), SessionPhase::Connected);
    }
    assert_matches!(
        session.read_frame().await,
        Err(SessionError::ReconnectRequired { failures: 10 })
    );
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert!(!session.state().connected);

    let started = Instant::now();
    session.reconnect(&CancellationToken::new()).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(5));

    assert_eq!(session.phase(), SessionPhase::Connected);
    assert_eq!(session.state().consecutive_read_failures, 0);
    assert_eq!(session.reconnects(), 1);
    session.read_frame().await.unwrap();
    assert_eq!(session.state().frames_processed, 1);

    let log = messages(&store);
    assert!(log.contains(&"Stream lost, reconnect required".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("Stream reconnected"));
}

#[tokio::test(start_paused = true)]
async fn closed_stream_requires_reconnect_immediately() {
    let source = ScriptedSource::new();
    let (mut session, store) = session(&source);
    session.connect().await.unwrap();

    session.read_frame().await.unwrap();
    source.script_close();
    assert_matches!(
        session.read_frame().await,
        Err(SessionError::ReconnectRequired { failures: 1 })
    );
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert!(!session.state().connected);

    let lost = store.lifecycle().pop().unwrap();
    assert_eq!(lost.message, "Stream lost, reconnect required");
    assert_eq!(lost.metadata["reason"], "early eof");

    let started = Instant::now();
    session.reconnect(&CancellationToken::new()).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    session.read_frame().await.unwrap();
    assert_eq!(session.state().frames_processed, 2);
    assert_eq!(source.attempts(), vec![Transport::Tcp, Transport::Tcp]);
}

#[tokio::test]
async fn successful_read_resets_failure_count() {
    let source = ScriptedSource::new();
    source.script_reads(&[true, false, false, false, true]);
    let (mut session, _store) = session(&source);
    session.connect().await.unwrap();

    for _ in 0..3 {
        let _ = session.read_frame().await;
    }
    assert_eq!(session.state().consecutive_read_failures, 3);

    session.read_frame().await.unwrap();
    assert_eq!(session.state().consecutive_read_failures, 0);
    assert_eq!(session.state().frames_processed, 1);
}

#[tokio::test]
async fn reading_without_a_stream_requires_reconnect() {
    let source = ScriptedSource::new();
    let (mut session, _store) = session(&source);

    assert_matches!(
        session.read_frame().await,
        Err(SessionError::ReconnectRequired { .. })
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnect_is_fatal() {
    let source = ScriptedSource::new();
    let (mut session, store) = session(&source);
    session.connect().await.unwrap();

    // Three attempts, two transports each.
    source.script_opens(&[false; 6]);

    let started = Instant::now();
    assert_matches!(
        session.reconnect(&CancellationToken::new()).await,
        Err(SessionError::Fatal(_))
    );
    // 5 s cool-down, then 10 s and 20 s of back-off.
    assert_eq!(started.elapsed(), Duration::from_secs(35));
    assert_eq!(source.attempts().len(), 1 + 6);
    assert_eq!(
        messages(&store).last().map(String::as_str),
        Some("Reconnect attempts exhausted")
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_cooldown() {
    let source = ScriptedSource::new();
    let (mut session, _store) = session(&source);
    session.connect().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    assert_matches!(session.reconnect(&cancel).await, Err(SessionError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(source.attempts().len(), 1);
}

#[tokio::test]
async fn release_is_idempotent() {
    let source = ScriptedSource::new();
    let (mut session, _store) = session(&source);
    session.connect().await.unwrap();

    session.release().await;
    session.release().await;
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert!(!session.state().connected);
}
