//! One channel's connection to its video stream.
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Reading
//!       ^                                        |
//!       +------ max_read_failures reached -------+
//! ```
//!
//! A transport counts as connected only after one liveness frame was read.
//! Each successful (re)connect gets a fresh session id that is attached to
//! its lifecycle records.

use std::sync::Arc;

use seatwatch_core::store::LogLevel;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::lifecycle::Lifecycle;
use crate::reconnect::next_delay;
use crate::source::{redact_url, Frame, FrameSource, FrameStream, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
    Reading,
}

/// Counters exposed for progress logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSessionState {
    pub connected: bool,
    pub consecutive_read_failures: u32,
    pub frames_processed: u64,
}

pub struct ChannelSession {
    url: String,
    source: Arc<dyn FrameSource>,
    config: SessionConfig,
    lifecycle: Lifecycle,
    stream: Option<Box<dyn FrameStream>>,
    phase: SessionPhase,
    state: ChannelSessionState,
    transport: Option<Transport>,
    session_id: Option<Uuid>,
    reconnects: u32,
}

impl ChannelSession {
    pub fn new(
        url: impl Into<String>,
        source: Arc<dyn FrameSource>,
        config: SessionConfig,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            url: url.into(),
            source,
            config,
            lifecycle,
            stream: None,
            phase: SessionPhase::Disconnected,
            state: ChannelSessionState::default(),
            transport: None,
            session_id: None,
            reconnects: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &ChannelSessionState {
        &self.state
    }

    /// Transport of the current or most recent connection.
    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Successful reconnects since creation.
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Open the stream, trying each transport in [`Transport::PREFERRED`] order.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.release().await;
        self.phase = SessionPhase::Connecting;

        let mut failures = Vec::new();
        for transport in Transport::PREFERRED {
            match self.open_verified(transport).await {
                Ok(stream) => {
                    let session_id = Uuid::now_v7();
                    self.stream = Some(stream);
                    self.phase = SessionPhase::Connected;
                    self.state.connected = true;
                    self.state.consecutive_read_failures = 0;
                    self.transport = Some(transport);
                    self.session_id = Some(session_id);

                    tracing::info!(
                        url = %redact_url(&self.url),
                        %transport,
                        %session_id,
                        "Stream connected"
                    );
                    self.lifecycle
                        .record(
                            LogLevel::Info,
                            "Stream connected",
                            json!({
                                "transport": transport.as_str(),
                                "session_id": session_id.to_string(),
                            }),
                        )
                        .await;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        url = %redact_url(&self.url),
                        %transport,
                        error = %e,
                        "Stream open failed"
                    );
                    self.lifecycle
                        .record(
                            LogLevel::Warning,
                            "Stream open failed",
                            json!({ "transport": transport.as_str(), "error": e.to_string() }),
                        )
                        .await;
                    failures.push(format!("{transport}: {e}"));
                }
            }
        }

        self.phase = SessionPhase::Disconnected;
        self.lifecycle
            .record(
                LogLevel::Error,
                "Stream connection failed",
                json!({ "url": redact_url(&self.url), "errors": failures }),
            )
            .await;
        Err(SessionError::Connection(failures.join("; ")))
    }

    async fn open_verified(
        &mut self,
        transport: Transport,
    ) -> Result<Box<dyn FrameStream>, SessionError> {
        let timeout = self.config.connect_timeout;

        let open = self.source.open(&self.url, transport, timeout);
        let mut stream = tokio::time::timeout(timeout, open)
            .await
            .map_err(|_| SessionError::Connection(format!("open timed out after {timeout:?}")))??;

        match tokio::time::timeout(timeout, stream.read_frame()).await {
            Ok(Ok(_)) => Ok(stream),
            Ok(Err(e)) => {
                stream.release().await;
                Err(SessionError::Connection(format!("liveness read failed: {e}")))
            }
            Err(_) => {
                stream.release().await;
                Err(SessionError::Connection(format!("no frame within {timeout:?}")))
            }
        }
    }

    /// Read the next frame.
    ///
    /// Returns [`SessionError::Read`] for a transient failure and
    /// [`SessionError::ReconnectRequired`] once `max_read_failures`
    /// consecutive reads failed or the stream reports itself closed, at
    /// which point the stream is released.
    pub async fn read_frame(&mut self) -> Result<Frame, SessionError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(SessionError::ReconnectRequired {
                failures: self.state.consecutive_read_failures,
            });
        };

        self.phase = SessionPhase::Reading;
        match stream.read_frame().await {
            Ok(frame) => {
                self.phase = SessionPhase::Connected;
                self.state.consecutive_read_failures = 0;
                self.state.frames_processed += 1;
                Ok(frame)
            }
            Err(SessionError::Closed(reason)) => {
                self.state.consecutive_read_failures += 1;
                let failures = self.state.consecutive_read_failures;
                tracing::warn!(failures, reason = %reason, "Stream closed");

                self.release().await;
                self.lifecycle
                    .record(
                        LogLevel::Warning,
                        "Stream lost, reconnect required",
                        json!({ "consecutive_read_failures": failures, "reason": reason }),
                    )
                    .await;
                Err(SessionError::ReconnectRequired { failures })
            }
            Err(e) => {
                self.state.consecutive_read_failures += 1;
                let failures = self.state.consecutive_read_failures;
                let max = self.config.max_read_failures;
                tracing::warn!(failures, max, error = %e, "Failed to read frame");

                if failures >= max {
                    self.release().await;
                    self.lifecycle
                        .record(
                            LogLevel::Warning,
                            "Stream lost, reconnect required",
                            json!({ "consecutive_read_failures": failures }),
                        )
                        .await;
                    return Err(SessionError::ReconnectRequired { failures });
                }

                self.phase = SessionPhase::Connected;
                Err(match e {
                    SessionError::Read(reason) => SessionError::Read(reason),
                    other => SessionError::Read(other.to_string()),
                })
            }
        }
    }

    /// Re-establish the stream with cool-down and bounded back-off.
    ///
    /// Returns [`SessionError::Cancelled`] as soon as `cancel` fires and
    /// [`SessionError::Fatal`] once every attempt failed.
    pub async fn reconnect(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.release().await;

        let policy = self.config.reconnect.clone();
        let mut delay = policy.cooldown;

        for attempt in 1..=policy.max_attempts {
            tracing::info!(
                url = %redact_url(&self.url),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to stream"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                result = self.connect() => result,
            };

            match result {
                Ok(()) => {
                    self.reconnects += 1;
                    self.lifecycle
                        .record(
                            LogLevel::Info,
                            "Stream reconnected",
                            json!({ "attempt": attempt, "reconnects": self.reconnects }),
                        )
                        .await;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt {attempt} failed");
                }
            }

            delay = next_delay(delay, &policy);
        }

        self.lifecycle
            .record(
                LogLevel::Error,
                "Reconnect attempts exhausted",
                json!({ "attempts": policy.max_attempts }),
            )
            .await;
        Err(SessionError::Fatal(format!(
            "stream unreachable after {} reconnect attempts",
            policy.max_attempts
        )))
    }

    /// Release the stream if one is open. Idempotent.
    pub async fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release().await;
            tracing::debug!(url = %redact_url(&self.url), "Stream released");
        }
        self.state.connected = false;
        self.phase = SessionPhase::Disconnected;
    }
}
