//! Scripted collaborators shared by the worker integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use image::RgbImage;
use seatwatch_core::geometry::{BoundingBox, Point};
use seatwatch_core::memory::MemoryStore;
use seatwatch_core::store::StateStore;
use seatwatch_core::types::ChannelId;
use seatwatch_core::zone::{Detection, StoreSite, Zone};
use seatwatch_worker::detector::Detector;
use seatwatch_worker::error::{DetectorError, SessionError};
use seatwatch_worker::source::{Frame, FrameSource, FrameStream, Transport};
use seatwatch_worker::worker::WorkerDeps;

pub const STORE_ID: &str = "gangnam";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn site() -> StoreSite {
    StoreSite {
        store_id: STORE_ID.into(),
        store_name: "Gangnam".into(),
        rtsp_host: Some("10.0.0.5".into()),
        rtsp_port: Some(554),
    }
}

/// Axis-aligned zone covering `(x1, y1)..(x2, y2)`.
pub fn zone(zone_id: &str, channel_id: ChannelId, x1: f64, y1: f64, x2: f64, y2: f64) -> Zone {
    Zone {
        zone_id: zone_id.into(),
        channel_id,
        region: vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ],
        label: None,
        is_active: true,
    }
}

/// Two zones on channel 1: `A1` at the left, `A2` at the right.
pub fn channel_one_zones() -> Vec<Zone> {
    vec![
        zone("A1", 1, 0.0, 0.0, 100.0, 100.0),
        zone("A2", 1, 200.0, 0.0, 300.0, 100.0),
    ]
}

pub fn store_with(zones: Vec<Zone>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_store(site(), zones))
}

pub fn person_in_a1() -> Detection {
    Detection::person(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.9)
}

pub fn laptop_in_a1() -> Detection {
    Detection::object("laptop", BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.8)
}

pub fn deps(
    store: &Arc<MemoryStore>,
    source: &Arc<ScriptedSource>,
    detector: Arc<dyn Detector>,
) -> WorkerDeps {
    WorkerDeps {
        store: store.clone() as Arc<dyn StateStore>,
        source: source.clone() as Arc<dyn FrameSource>,
        detector,
    }
}

pub fn messages(store: &MemoryStore) -> Vec<String> {
    store.lifecycle().into_iter().map(|r| r.message).collect()
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Frame source driven by per-call scripts.
///
/// `opens` and `reads` are consumed one entry per call; `true` succeeds,
/// `false` fails. An exhausted script always succeeds. Frames are 1 pixel
/// high and as wide as the channel number parsed from the URL.
#[derive(Default)]
pub struct ScriptedSource {
    opens: Mutex<VecDeque<bool>>,
    reads: Arc<Mutex<VecDeque<ReadStep>>>,
    attempts: Mutex<Vec<Transport>>,
}

#[derive(Debug, Clone, Copy)]
enum ReadStep {
    Frame,
    Fail,
    /// The stream dies; it stays closed for the rest of its life.
    Close,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_opens(&self, script: &[bool]) {
        self.opens.lock().unwrap().extend(script.iter().copied());
    }

    pub fn script_reads(&self, script: &[bool]) {
        self.reads.lock().unwrap().extend(
            script
                .iter()
                .map(|ok| if *ok { ReadStep::Frame } else { ReadStep::Fail }),
        );
    }

    /// The next read finds the current stream dead.
    pub fn script_close(&self) {
        self.reads.lock().unwrap().push_back(ReadStep::Close);
    }

    /// Transports of every `open` call so far.
    pub fn attempts(&self) -> Vec<Transport> {
        self.attempts.lock().unwrap().clone()
    }
}

fn channel_from_url(url: &str) -> u32 {
    url.rsplit("live_")
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn open(
        &self,
        url: &str,
        transport: Transport,
        _timeout: Duration,
    ) -> Result<Box<dyn FrameStream>, SessionError> {
        self.attempts.lock().unwrap().push(transport);
        let ok = self.opens.lock().unwrap().pop_front().unwrap_or(true);
        if !ok {
            return Err(SessionError::Connection("connection refused".into()));
        }
        Ok(Box::new(ScriptedStream {
            reads: self.reads.clone(),
            width: channel_from_url(url).max(1),
            closed: false,
        }))
    }
}

struct ScriptedStream {
    reads: Arc<Mutex<VecDeque<ReadStep>>>,
    width: u32,
    closed: bool,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn read_frame(&mut self) -> Result<Frame, SessionError> {
        if self.closed {
            return Err(SessionError::Closed("decoder exited".into()));
        }
        let step = self.reads.lock().unwrap().pop_front().unwrap_or(ReadStep::Frame);
        match step {
            ReadStep::Frame => {}
            ReadStep::Fail => return Err(SessionError::Read("decode error".into())),
            ReadStep::Close => {
                self.closed = true;
                return Err(SessionError::Closed("early eof".into()));
            }
        }
        Ok(Frame {
            image: RgbImage::new(self.width, 1),
            captured_at: Utc::now(),
        })
    }

    async fn release(&mut self) {}
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

/// Returns scripted results in order, then `fallback` forever.
#[derive(Default)]
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Option<Vec<Detection>>>>,
    fallback: Mutex<Vec<Detection>>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(fallback: Vec<Detection>) -> Arc<Self> {
        Arc::new(Self {
            fallback: Mutex::new(fallback),
            ..Default::default()
        })
    }

    pub fn push(&self, detections: Vec<Detection>) {
        self.script.lock().unwrap().push_back(Some(detections));
    }

    /// Queue one failing call.
    pub fn push_failure(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    pub fn set_fallback(&self, detections: Vec<Detection>) {
        *self.fallback.lock().unwrap() = detections;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(
        &self,
        _image: &RgbImage,
        _confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Some(detections)) => Ok(detections),
            Some(None) => Err(DetectorError::Internal("model unavailable".into())),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

/// Misbehaves on frames of one channel and finds nothing elsewhere.
pub enum Fault {
    /// Never returns.
    Hang,
    Panic,
}

pub struct FaultyDetector {
    pub channel_id: u32,
    pub fault: Fault,
}

#[async_trait]
impl Detector for FaultyDetector {
    async fn detect(
        &self,
        image: &RgbImage,
        _confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        if image.width() == self.channel_id {
            match self.fault {
                Fault::Hang => std::future::pending::<()>().await,
                Fault::Panic => panic!("detector crashed on channel {}", self.channel_id),
            }
        }
        Ok(Vec::new())
    }
}
