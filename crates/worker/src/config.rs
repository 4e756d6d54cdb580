//! Monitor configuration loaded from environment variables.
//!
//! Every value has a default suitable for a single-store deployment except
//! `DATABASE_URL`. Parsing is done against a lookup function so tests can
//! supply variables without touching the process environment.

use std::str::FromStr;
use std::time::Duration;

use seatwatch_core::error::CoreError;
use seatwatch_core::occupancy::{
    EngineConfig, DEFAULT_ABANDON_THRESHOLD_SECS, DEFAULT_IOU_THRESHOLD,
    DEFAULT_SNAPSHOT_INTERVAL_SECS,
};
use seatwatch_core::types::ChannelId;
use seatwatch_core::zone::StoreSite;

use crate::reconnect::ReconnectConfig;

/// Highest channel number a recorder exposes.
pub const MAX_CHANNEL: ChannelId = 16;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

pub const DEFAULT_OBJECT_CLASSES: &str =
    "backpack,handbag,suitcase,laptop,cell phone,book,umbrella";

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Credentials and default endpoint of the RTSP recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct RtspConfig {
    pub username: String,
    pub password: String,
    /// Used when the store row has no host of its own.
    pub host: String,
    pub port: u16,
}

impl Default for RtspConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: String::new(),
            host: "127.0.0.1".into(),
            port: 8554,
        }
    }
}

impl RtspConfig {
    /// Stream URL of one channel, e.g. `rtsp://admin:pw@10.0.0.5:554/live_03`.
    pub fn channel_url(&self, site: &StoreSite, channel_id: ChannelId) -> String {
        let host = site.rtsp_host.as_deref().unwrap_or(&self.host);
        let port = site.rtsp_port.unwrap_or(self.port);
        format!(
            "rtsp://{}:{}@{}:{}/live_{:02}",
            self.username, self.password, host, port, channel_id
        )
    }
}

/// Connection and read-failure policy of a channel session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    /// Consecutive read failures that force a reconnect.
    pub max_read_failures: u32,
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            max_read_failures: 10,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// HTTP detection service.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub url: String,
    pub timeout: Duration,
    pub confidence_threshold: f64,
    /// Non-person labels that count as belongings.
    pub object_classes: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/detect".into(),
            timeout: Duration::from_secs(10),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            object_classes: split_list(DEFAULT_OBJECT_CLASSES),
        }
    }
}

/// External binaries used to decode video.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
        }
    }
}

/// Worker lifecycle management.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Channels monitored when none are requested explicitly.
    pub active_channels: Vec<ChannelId>,
    /// Pause between consecutive worker starts.
    pub stagger: Duration,
    /// How long `stop()` waits for cooperative exit before aborting.
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            active_channels: (1..=MAX_CHANNEL).collect(),
            stagger: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Everything a channel worker needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub confidence_threshold: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl WorkerConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.engine.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub rtsp: RtspConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub detector: DetectorConfig,
    pub ffmpeg: FfmpegConfig,
    pub supervisor: SupervisorConfig,
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                          |
    /// |----------------------------|----------------------------------|
    /// | `DATABASE_URL`             | required                         |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`                             |
    /// | `RTSP_USERNAME`            | `admin`                          |
    /// | `RTSP_PASSWORD`            | empty                            |
    /// | `RTSP_HOST`                | `127.0.0.1`                      |
    /// | `RTSP_PORT`                | `8554`                           |
    /// | `ACTIVE_CHANNELS`          | `1,2,...,16`                     |
    /// | `CONFIDENCE_THRESHOLD`     | `0.5`                            |
    /// | `IOU_THRESHOLD`            | `0.3`                            |
    /// | `OBJECT_IOU_THRESHOLD`     | `IOU_THRESHOLD`                  |
    /// | `SNAPSHOT_INTERVAL_SECS`   | `3`                              |
    /// | `ABANDON_THRESHOLD_SECS`   | `600`                            |
    /// | `CONNECT_TIMEOUT_SECS`     | `15`                             |
    /// | `MAX_READ_FAILURES`        | `10`                             |
    /// | `RECONNECT_COOLDOWN_SECS`  | `5`                              |
    /// | `RECONNECT_ATTEMPTS`       | `3`                              |
    /// | `START_STAGGER_MS`         | `1000`                           |
    /// | `SHUTDOWN_GRACE_SECS`      | `10`                             |
    /// | `DETECTOR_URL`             | `http://127.0.0.1:8000/detect`   |
    /// | `DETECTOR_TIMEOUT_SECS`    | `10`                             |
    /// | `OBJECT_CLASSES`           | `backpack,handbag,...,umbrella`  |
    /// | `FFMPEG_PATH`              | `ffmpeg`                         |
    /// | `FFPROBE_PATH`             | `ffprobe`                        |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let database_url = env
            .string("DATABASE_URL")
            .ok_or_else(|| CoreError::Configuration("DATABASE_URL must be set".into()))?;

        let rtsp_defaults = RtspConfig::default();
        let rtsp = RtspConfig {
            username: env.string("RTSP_USERNAME").unwrap_or(rtsp_defaults.username),
            password: env.string("RTSP_PASSWORD").unwrap_or(rtsp_defaults.password),
            host: env.string("RTSP_HOST").unwrap_or(rtsp_defaults.host),
            port: env.parse("RTSP_PORT", rtsp_defaults.port)?,
        };

        let iou_threshold = env.parse("IOU_THRESHOLD", DEFAULT_IOU_THRESHOLD)?;
        let engine = EngineConfig {
            iou_threshold,
            object_iou_threshold: env.parse("OBJECT_IOU_THRESHOLD", iou_threshold)?,
            interval_secs: env.parse("SNAPSHOT_INTERVAL_SECS", DEFAULT_SNAPSHOT_INTERVAL_SECS)?,
            abandon_threshold_secs: env
                .parse("ABANDON_THRESHOLD_SECS", DEFAULT_ABANDON_THRESHOLD_SECS)?,
        };
        engine
            .validate()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;

        let reconnect_defaults = ReconnectConfig::default();
        let session = SessionConfig {
            connect_timeout: Duration::from_secs(env.parse("CONNECT_TIMEOUT_SECS", 15)?),
            max_read_failures: env.parse("MAX_READ_FAILURES", 10)?,
            reconnect: ReconnectConfig {
                cooldown: Duration::from_secs(env.parse("RECONNECT_COOLDOWN_SECS", 5)?),
                max_attempts: env.parse("RECONNECT_ATTEMPTS", reconnect_defaults.max_attempts)?,
                ..reconnect_defaults
            },
        };
        if session.max_read_failures == 0 {
            return Err(CoreError::Configuration(
                "MAX_READ_FAILURES must be at least 1".into(),
            ));
        }
        if session.reconnect.max_attempts == 0 {
            return Err(CoreError::Configuration(
                "RECONNECT_ATTEMPTS must be at least 1".into(),
            ));
        }
        if session.connect_timeout.is_zero() {
            return Err(CoreError::Configuration(
                "CONNECT_TIMEOUT_SECS must be at least 1".into(),
            ));
        }

        let detector_defaults = DetectorConfig::default();
        let confidence_threshold =
            env.parse("CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD)?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(CoreError::Configuration(format!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {confidence_threshold}"
            )));
        }
        let detector = DetectorConfig {
            url: env.string("DETECTOR_URL").unwrap_or(detector_defaults.url),
            timeout: Duration::from_secs(env.parse("DETECTOR_TIMEOUT_SECS", 10)?),
            confidence_threshold,
            object_classes: env
                .string("OBJECT_CLASSES")
                .map(|s| split_list(&s))
                .unwrap_or(detector_defaults.object_classes),
        };

        let ffmpeg_defaults = FfmpegConfig::default();
        let ffmpeg = FfmpegConfig {
            ffmpeg_path: env.string("FFMPEG_PATH").unwrap_or(ffmpeg_defaults.ffmpeg_path),
            ffprobe_path: env.string("FFPROBE_PATH").unwrap_or(ffmpeg_defaults.ffprobe_path),
        };

        let supervisor_defaults = SupervisorConfig::default();
        let supervisor = SupervisorConfig {
            active_channels: match env.string("ACTIVE_CHANNELS") {
                Some(raw) => parse_active_channels(&raw)?,
                None => supervisor_defaults.active_channels,
            },
            stagger: Duration::from_millis(env.parse("START_STAGGER_MS", 1000)?),
            shutdown_grace: Duration::from_secs(env.parse("SHUTDOWN_GRACE_SECS", 10)?),
        };

        Ok(Self {
            database_url,
            database_max_connections: env.parse(
                "DATABASE_MAX_CONNECTIONS",
                seatwatch_db::DEFAULT_MAX_CONNECTIONS,
            )?,
            rtsp,
            engine,
            session,
            detector,
            ffmpeg,
            supervisor,
        })
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            engine: self.engine.clone(),
            session: self.session.clone(),
            confidence_threshold: self.detector.confidence_threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, CoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| CoreError::Configuration(format!("{key}={raw:?} is invalid: {e}"))),
            None => Ok(default),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a comma-separated channel list such as `1, 2,5`.
///
/// Duplicates are removed and the result is sorted.
pub fn parse_channel_list(raw: &str) -> Result<Vec<ChannelId>, CoreError> {
    let mut channels = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ChannelId>()
                .map_err(|_| CoreError::Configuration(format!("invalid channel number {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    channels.sort_unstable();
    channels.dedup();
    Ok(channels)
}

/// `ACTIVE_CHANNELS` ignores numbers outside `1..=MAX_CHANNEL`.
fn parse_active_channels(raw: &str) -> Result<Vec<ChannelId>, CoreError> {
    let channels: Vec<_> = parse_channel_list(raw)?
        .into_iter()
        .filter(|c| (1..=MAX_CHANNEL).contains(c))
        .collect();
    if channels.is_empty() {
        return Err(CoreError::Configuration(format!(
            "ACTIVE_CHANNELS={raw:?} names no channel in 1..={MAX_CHANNEL}"
        )));
    }
    Ok(channels)
}
