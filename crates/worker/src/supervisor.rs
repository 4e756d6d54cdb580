//! Starts, tracks, and stops the channel workers of one store.
//!
//! Each worker runs in its own tokio task with a child of the supervisor's
//! cancellation token. A worker that fails or panics never affects its
//! siblings; its outcome is recorded in the [`SupervisorReport`].

use std::collections::BTreeMap;
use std::future::Future;

use seatwatch_core::error::CoreError;
use seatwatch_core::types::ChannelId;
use seatwatch_core::zone::{zones_for_channel, Zone};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{RtspConfig, SupervisorConfig, WorkerConfig};
use crate::worker::{ChannelWorker, WorkerDeps, WorkerExit};

/// Final state of one requested channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Stopped { frames_processed: u64 },
    Misconfigured(String),
    Fatal(String),
    /// Did not exit within the shutdown grace period.
    Aborted,
    Panicked(String),
}

impl From<WorkerExit> for ChannelOutcome {
    fn from(exit: WorkerExit) -> Self {
        match exit {
            WorkerExit::Stopped { frames_processed } => ChannelOutcome::Stopped { frames_processed },
            WorkerExit::Misconfigured(reason) => ChannelOutcome::Misconfigured(reason),
            WorkerExit::Fatal(reason) => ChannelOutcome::Fatal(reason),
        }
    }
}

impl ChannelOutcome {
    fn from_join(result: Result<WorkerExit, JoinError>) -> Self {
        match result {
            Ok(exit) => exit.into(),
            Err(e) if e.is_cancelled() => ChannelOutcome::Aborted,
            Err(e) => ChannelOutcome::Panicked(e.to_string()),
        }
    }
}

/// Per-channel outcomes, ordered by channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub outcomes: BTreeMap<ChannelId, ChannelOutcome>,
}

impl SupervisorReport {
    pub fn misconfigured_channels(&self) -> Vec<ChannelId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Misconfigured(_)))
            .map(|(c, _)| *c)
            .collect()
    }

    /// `1` when any requested channel could not be configured, else `0`.
    pub fn exit_code(&self) -> u8 {
        if self.misconfigured_channels().is_empty() {
            0
        } else {
            1
        }
    }
}

struct ManagedWorker {
    channel_id: ChannelId,
    handle: JoinHandle<WorkerExit>,
}

pub struct Supervisor {
    deps: WorkerDeps,
    worker_config: WorkerConfig,
    rtsp: RtspConfig,
    config: SupervisorConfig,
    cancel: CancellationToken,
    workers: Vec<ManagedWorker>,
    outcomes: BTreeMap<ChannelId, ChannelOutcome>,
}

impl Supervisor {
    pub fn new(
        deps: WorkerDeps,
        worker_config: WorkerConfig,
        rtsp: RtspConfig,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            deps,
            worker_config,
            rtsp,
            config,
            cancel: CancellationToken::new(),
            workers: Vec::new(),
            outcomes: BTreeMap::new(),
        }
    }

    /// Token cancelled by [`Supervisor::stop`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start one worker per usable channel.
    ///
    /// With `channel_ids == None` the configured active channels that have
    /// at least one active zone are started. Requested channels without
    /// zones are recorded as misconfigured. Returns the started channels.
    pub async fn start(
        &mut self,
        store_id: &str,
        channel_ids: Option<&[ChannelId]>,
    ) -> Result<Vec<ChannelId>, CoreError> {
        let site = self
            .deps
            .store
            .get_store(store_id)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to load store: {e}")))?
            .ok_or_else(|| CoreError::Configuration(format!("unknown store {store_id:?}")))?;

        let zones = self
            .deps
            .store
            .get_zones(store_id, true)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to load zones: {e}")))?;

        let requested = self.requested_channels(&zones, channel_ids);
        let mut startable = Vec::new();
        for channel_id in requested {
            if zones_for_channel(&zones, channel_id).is_empty() {
                tracing::warn!(store_id, channel_id, "No active zones, channel not started");
                self.outcomes.insert(
                    channel_id,
                    ChannelOutcome::Misconfigured(format!(
                        "no active zones configured for channel {channel_id}"
                    )),
                );
            } else {
                startable.push(channel_id);
            }
        }

        if startable.is_empty() {
            return Err(CoreError::Configuration(format!(
                "store {store_id:?} has no startable channels"
            )));
        }

        tracing::info!(
            store_id,
            store_name = %site.store_name,
            channels = ?startable,
            "Starting channel workers"
        );

        let mut started = Vec::with_capacity(startable.len());
        for (i, channel_id) in startable.into_iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.stagger) => {}
                }
            }

            let url = self.rtsp.channel_url(&site, channel_id);
            self.spawn_worker(store_id, channel_id, url);
            started.push(channel_id);
        }

        Ok(started)
    }

    fn requested_channels(&self, zones: &[Zone], channel_ids: Option<&[ChannelId]>) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = match channel_ids {
            Some(ids) => ids.to_vec(),
            None => self
                .config
                .active_channels
                .iter()
                .copied()
                .filter(|c| zones.iter().any(|z| z.channel_id == *c))
                .collect(),
        };
        channels.sort_unstable();
        channels.dedup();
        channels
    }

    fn spawn_worker(&mut self, store_id: &str, channel_id: ChannelId, url: String) {
        let worker = ChannelWorker::new(
            store_id,
            channel_id,
            url,
            self.worker_config.clone(),
            self.deps.clone(),
            self.cancel.child_token(),
        );
        let span = tracing::info_span!("channel", store_id, channel_id);
        let handle = tokio::spawn(worker.run().instrument(span));

        tracing::info!(store_id, channel_id, "Channel worker spawned");
        self.workers.push(ManagedWorker { channel_id, handle });
    }

    /// Channels whose task has not finished yet.
    pub fn running_channels(&self) -> Vec<ChannelId> {
        self.workers
            .iter()
            .filter(|w| !w.handle.is_finished())
            .map(|w| w.channel_id)
            .collect()
    }

    /// Request shutdown and wait for every worker.
    ///
    /// Workers get one shared grace period to exit cooperatively; any still
    /// running afterwards are aborted.
    pub async fn stop(&mut self) {
        tracing::info!(workers = self.workers.len(), "Stopping channel workers");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        for mut worker in std::mem::take(&mut self.workers) {
            let outcome = match tokio::time::timeout_at(deadline, &mut worker.handle).await {
                Ok(result) => ChannelOutcome::from_join(result),
                Err(_) => {
                    tracing::warn!(
                        channel_id = worker.channel_id,
                        "Worker did not stop in time, aborting"
                    );
                    worker.handle.abort();
                    ChannelOutcome::from_join(worker.handle.await)
                }
            };
            self.outcomes.insert(worker.channel_id, outcome);
        }

        tracing::info!("Channel workers stopped");
    }

    /// Join every worker; if `interrupt` resolves first, [`stop`](Self::stop).
    pub async fn wait<F>(&mut self, interrupt: F) -> SupervisorReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        while !self.workers.is_empty() {
            let finished = {
                let worker = &mut self.workers[0];
                tokio::select! {
                    _ = &mut interrupt => None,
                    result = &mut worker.handle => Some(result),
                }
            };

            match finished {
                Some(result) => {
                    let worker = self.workers.remove(0);
                    let outcome = ChannelOutcome::from_join(result);
                    tracing::info!(channel_id = worker.channel_id, ?outcome, "Worker exited");
                    self.outcomes.insert(worker.channel_id, outcome);
                }
                None => {
                    tracing::info!("Shutdown requested");
                    self.stop().await;
                }
            }
        }

        self.report()
    }

    pub fn report(&self) -> SupervisorReport {
        SupervisorReport {
            outcomes: self.outcomes.clone(),
        }
    }
}
