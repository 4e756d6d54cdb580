//! Per-channel monitoring loop.
//!
//! A [`ChannelWorker`] owns one channel end to end: it loads the channel's
//! zones, connects the video session, and on every sampling tick reads a
//! frame, runs detection, classifies each zone, and persists status rows
//! and transition events. Per-tick failures are absorbed; only an
//! exhausted reconnect or a failed initial connect ends the worker.

use std::collections::HashMap;
use std::sync::Arc;

use seatwatch_core::differ::EventDiffer;
use seatwatch_core::occupancy::{OccupancyEngine, ZoneObservation};
use seatwatch_core::store::{LogLevel, StateStore};
use seatwatch_core::types::{ChannelId, Timestamp, ZoneId};
use seatwatch_core::zone::{zones_for_channel, Zone, ZoneState, ZoneStatus};
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::detector::Detector;
use crate::error::SessionError;
use crate::lifecycle::Lifecycle;
use crate::session::ChannelSession;
use crate::source::FrameSource;

/// Frames between progress log lines.
const PROGRESS_LOG_EVERY: u64 = 20;

/// Collaborators shared by every worker of a process.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Arc<dyn StateStore>,
    pub source: Arc<dyn FrameSource>,
    pub detector: Arc<dyn Detector>,
}

/// Why a worker returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Shutdown was requested.
    Stopped { frames_processed: u64 },
    /// The channel has no usable zones; nothing was connected.
    Misconfigured(String),
    /// The stream could not be (re)established or the store was unreadable.
    Fatal(String),
}

pub struct ChannelWorker {
    store_id: String,
    channel_id: ChannelId,
    url: String,
    config: WorkerConfig,
    deps: WorkerDeps,
    cancel: CancellationToken,
    lifecycle: Lifecycle,
}

impl ChannelWorker {
    pub fn new(
        store_id: impl Into<String>,
        channel_id: ChannelId,
        url: impl Into<String>,
        config: WorkerConfig,
        deps: WorkerDeps,
        cancel: CancellationToken,
    ) -> Self {
        let store_id = store_id.into();
        let lifecycle = Lifecycle::for_channel(deps.store.clone(), store_id.clone(), channel_id);
        Self {
            store_id,
            channel_id,
            url: url.into(),
            config,
            deps,
            cancel,
            lifecycle,
        }
    }

    /// Run until shutdown or a fatal error.
    pub async fn run(self) -> WorkerExit {
        let exit = match self.initialize().await {
            Ok(mut channel) => {
                let exit = channel.run_loop(&self.cancel).await;
                channel.session.release().await;
                exit
            }
            Err(exit) => exit,
        };
        self.record_exit(&exit).await;
        exit
    }

    /// Log the exit and append the terminal lifecycle record.
    async fn record_exit(&self, exit: &WorkerExit) {
        match exit {
            WorkerExit::Stopped { frames_processed } => {
                tracing::info!(
                    store_id = %self.store_id,
                    channel_id = self.channel_id,
                    frames_processed,
                    "Worker stopped"
                );
                self.lifecycle
                    .record(
                        LogLevel::Info,
                        "Worker stopped",
                        json!({ "frames_processed": frames_processed }),
                    )
                    .await;
            }
            WorkerExit::Misconfigured(reason) => {
                tracing::error!(
                    store_id = %self.store_id,
                    channel_id = self.channel_id,
                    reason = %reason,
                    "Worker misconfigured"
                );
                self.lifecycle
                    .record(LogLevel::Error, "Worker misconfigured", json!({ "reason": reason }))
                    .await;
            }
            WorkerExit::Fatal(reason) => {
                tracing::error!(
                    store_id = %self.store_id,
                    channel_id = self.channel_id,
                    reason = %reason,
                    "Worker terminated"
                );
                self.lifecycle
                    .record(LogLevel::Error, "Worker terminated", json!({ "reason": reason }))
                    .await;
            }
        }
    }

    async fn initialize(&self) -> Result<ActiveChannel, WorkerExit> {
        let zones = self
            .deps
            .store
            .get_zones(&self.store_id, true)
            .await
            .map_err(|e| WorkerExit::Fatal(format!("failed to load zones: {e}")))?;

        let zones = zones_for_channel(&zones, self.channel_id);
        if zones.is_empty() {
            return Err(WorkerExit::Misconfigured(format!(
                "no active zones configured for channel {}",
                self.channel_id
            )));
        }

        let engine = OccupancyEngine::new(&zones, self.config.engine.clone())
            .map_err(|e| WorkerExit::Misconfigured(e.to_string()))?;

        let labels: Vec<&str> = zones.iter().map(Zone::display_label).collect();
        tracing::info!(
            store_id = %self.store_id,
            channel_id = self.channel_id,
            zones = engine.zone_count(),
            ?labels,
            "Channel zones loaded"
        );

        let mut session = ChannelSession::new(
            self.url.clone(),
            self.deps.source.clone(),
            self.config.session.clone(),
            self.lifecycle.clone(),
        );

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => return Err(WorkerExit::Stopped { frames_processed: 0 }),
            result = session.connect() => result,
        };
        connected.map_err(|e| WorkerExit::Fatal(e.to_string()))?;

        self.lifecycle
            .record(
                LogLevel::Info,
                "Worker started",
                json!({ "zones": engine.zone_count() }),
            )
            .await;

        Ok(ActiveChannel {
            store_id: self.store_id.clone(),
            channel_id: self.channel_id,
            config: self.config.clone(),
            store: self.deps.store.clone(),
            detector: self.deps.detector.clone(),
            differ: EventDiffer::new(self.store_id.clone(), self.channel_id),
            engine,
            session,
            known: HashMap::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Running channel
// ---------------------------------------------------------------------------

enum TickOutcome {
    Processed,
    Skipped,
    Cancelled,
    Fatal(String),
}

struct ActiveChannel {
    store_id: String,
    channel_id: ChannelId,
    config: WorkerConfig,
    store: Arc<dyn StateStore>,
    detector: Arc<dyn Detector>,
    differ: EventDiffer,
    engine: OccupancyEngine,
    session: ChannelSession,
    /// Last known state per zone; filled from the store on first use.
    known: HashMap<ZoneId, ZoneState>,
}

impl ActiveChannel {
    async fn run_loop(&mut self, cancel: &CancellationToken) -> WorkerExit {
        let mut ticker = tokio::time::interval(self.config.sampling_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(cancel).await {
                TickOutcome::Processed | TickOutcome::Skipped => {}
                TickOutcome::Cancelled => break,
                TickOutcome::Fatal(reason) => return WorkerExit::Fatal(reason),
            }
        }

        WorkerExit::Stopped {
            frames_processed: self.session.state().frames_processed,
        }
    }

    async fn tick(&mut self, cancel: &CancellationToken) -> TickOutcome {
        let frame = match self.session.read_frame().await {
            Ok(frame) => frame,
            Err(SessionError::ReconnectRequired { .. }) => {
                return match self.session.reconnect(cancel).await {
                    Ok(()) => TickOutcome::Skipped,
                    Err(SessionError::Cancelled) => TickOutcome::Cancelled,
                    Err(e) => TickOutcome::Fatal(e.to_string()),
                };
            }
            Err(e) => {
                tracing::debug!(channel_id = self.channel_id, error = %e, "Skipping tick");
                return TickOutcome::Skipped;
            }
        };

        let detections = match self
            .detector
            .detect(&frame.image, self.config.confidence_threshold)
            .await
        {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(
                    channel_id = self.channel_id,
                    error = %e,
                    "Detection failed, skipping tick"
                );
                return TickOutcome::Skipped;
            }
        };

        let now = frame.captured_at;
        for observation in self.engine.classify(&detections) {
            self.apply(observation, now).await;
        }

        let frames = self.session.state().frames_processed;
        if frames % PROGRESS_LOG_EVERY == 0 {
            let occupied = self
                .known
                .values()
                .filter(|s| s.status == ZoneStatus::Occupied)
                .count();
            tracing::info!(
                store_id = %self.store_id,
                channel_id = self.channel_id,
                frames,
                occupied,
                total = self.engine.zone_count(),
                "Channel progress"
            );
        }

        TickOutcome::Processed
    }

    async fn apply(&mut self, observation: ZoneObservation, now: Timestamp) {
        let cached = self.known.get(&observation.zone_id).cloned();
        let prior = match cached {
            Some(state) => state,
            None => self.load_state(&observation.zone_id).await,
        };

        let next = self.engine.transition(&prior, &observation, now);
        let outcome = self
            .differ
            .diff(&observation.zone_id, prior.status, &next, &observation, now);

        if let Err(e) = self
            .store
            .upsert_zone_status(&self.store_id, &observation.zone_id, &outcome.payload)
            .await
        {
            tracing::warn!(
                zone_id = %observation.zone_id,
                error = %e,
                "Failed to update zone status"
            );
        }

        if let Some(event) = &outcome.event {
            tracing::info!(
                store_id = %self.store_id,
                channel_id = self.channel_id,
                zone_id = %event.zone_id,
                previous = %event.previous_status,
                new = %event.new_status,
                event_type = %event.event_type,
                "Zone status changed"
            );
            if let Err(e) = self.store.append_event(event).await {
                tracing::warn!(
                    zone_id = %event.zone_id,
                    event_type = %event.event_type,
                    error = %e,
                    "Failed to record zone event"
                );
            }
        }

        self.known
            .insert(observation.zone_id, outcome.payload.to_state());
    }

    /// Persisted state of a zone, or the default (empty) state when none
    /// exists or the store cannot be read.
    async fn load_state(&mut self, zone_id: &str) -> ZoneState {
        match self.store.get_zone_status(&self.store_id, zone_id).await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(zone_id, error = %e, "Failed to load zone status");
                ZoneState::default()
            }
        }
    }
}
