//! [`FrameSource`] that decodes RTSP through `ffprobe` and `ffmpeg`.
//!
//! `ffprobe` reports the stream dimensions, then a long-lived `ffmpeg`
//! child writes raw `rgb24` frames to stdout at the sampling rate. Each
//! frame is exactly `width * height * 3` bytes. Decoder crashes take down
//! the child process only.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use image::RgbImage;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use super::{redact_url, Frame, FrameSource, FrameStream, Transport};
use crate::config::FfmpegConfig;
use crate::error::SessionError;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe failed (exit code {exit_code:?}): {stderr}")]
    ProbeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),

    #[error("stream has no video dimensions")]
    NoVideo,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FfmpegError {
    /// Classify a failure to launch a binary.
    fn spawn(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            FfmpegError::NotFound(e)
        } else {
            FfmpegError::Io(e)
        }
    }
}

impl From<FfmpegError> for SessionError {
    fn from(e: FfmpegError) -> Self {
        SessionError::Connection(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// `ffprobe -of json -show_entries stream=width,height` output.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_dimensions(stdout: &str) -> Result<(u32, u32), FfmpegError> {
    let output: FfprobeOutput =
        serde_json::from_str(stdout).map_err(|e| FfmpegError::Parse(format!("{e}: {stdout}")))?;
    output
        .streams
        .iter()
        .find_map(|s| match (s.width, s.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        })
        .ok_or(FfmpegError::NoVideo)
}

// ---------------------------------------------------------------------------
// FfmpegFrameSource
// ---------------------------------------------------------------------------

pub struct FfmpegFrameSource {
    config: FfmpegConfig,
    /// Output frame period; matches the worker's sampling interval.
    sample_interval: Duration,
}

impl FfmpegFrameSource {
    pub fn new(config: FfmpegConfig, sample_interval: Duration) -> Self {
        Self {
            config,
            sample_interval,
        }
    }

    async fn probe(
        &self,
        url: &str,
        transport: Transport,
        timeout: Duration,
    ) -> Result<(u32, u32), FfmpegError> {
        let mut command = Command::new(&self.config.ffprobe_path);
        command
            .args(["-v", "error", "-rtsp_transport", transport.as_str()])
            .args(["-timeout", &timeout.as_micros().to_string()])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height", "-of", "json"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| FfmpegError::Timeout(timeout))?
            .map_err(FfmpegError::spawn)?;

        if !output.status.success() {
            return Err(FfmpegError::ProbeFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_dimensions(&String::from_utf8_lossy(&output.stdout))
    }

    fn spawn_decoder(
        &self,
        url: &str,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Child, FfmpegError> {
        let fps = format!("fps=1/{}", self.sample_interval.as_secs_f64().max(0.001));
        Command::new(&self.config.ffmpeg_path)
            .args(["-nostdin", "-loglevel", "error"])
            .args(["-rtsp_transport", transport.as_str()])
            .args(["-timeout", &timeout.as_micros().to_string()])
            .args(["-i", url])
            .args(["-an", "-vf", &fps])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(FfmpegError::spawn)
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn open(
        &self,
        url: &str,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Box<dyn FrameStream>, SessionError> {
        let (width, height) = self.probe(url, transport, timeout).await?;
        let mut child = self.spawn_decoder(url, transport, timeout)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Connection("ffmpeg stdout not captured".into()))?;

        tracing::debug!(
            url = %redact_url(url),
            %transport,
            width,
            height,
            "ffmpeg decoder started"
        );

        Ok(Box::new(FfmpegStream {
            child: Some(child),
            stdout,
            width,
            height,
            // One sampling period plus the connect budget for network jitter.
            read_timeout: self.sample_interval + timeout,
        }))
    }
}

struct FfmpegStream {
    child: Option<Child>,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    read_timeout: Duration,
}

impl FfmpegStream {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[async_trait]
impl FrameStream for FfmpegStream {
    async fn read_frame(&mut self) -> Result<Frame, SessionError> {
        if self.child.is_none() {
            return Err(SessionError::Closed("decoder released".into()));
        }

        // A partial read leaves the pipe misaligned, so any failure ends
        // this decoder for good.
        let mut buf = vec![0u8; self.frame_len()];
        let read = self.stdout.read_exact(&mut buf);
        let failure = match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("no frame within {:?}", self.read_timeout)),
        };
        if let Some(reason) = failure {
            self.release().await;
            return Err(SessionError::Closed(reason));
        }

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| SessionError::Read("frame buffer size mismatch".into()))?;
        Ok(Frame {
            image,
            captured_at: Utc::now(),
        })
    }

    async fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "ffmpeg already exited");
            }
            let _ = child.wait().await;
        }
    }
}
