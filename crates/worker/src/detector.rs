//! Person and belongings detection.
//!
//! [`HttpDetector`] posts a JPEG-encoded frame to an inference service:
//!
//! ```text
//! POST {DETECTOR_URL}?confidence=0.5
//! Content-Type: image/jpeg
//!
//! {"detections": [{"bbox": [x1, y1, x2, y2], "class": "person", "score": 0.91}]}
//! ```
//!
//! `person` becomes [`DetectionClass::Person`], configured object classes
//! become [`DetectionClass::Object`], anything else is dropped.

use std::collections::HashSet;
use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use seatwatch_core::geometry::BoundingBox;
use seatwatch_core::zone::{Detection, DetectionClass};

use crate::config::DetectorConfig;
use crate::error::DetectorError;

const PERSON_CLASS: &str = "person";

/// Detection model boundary.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detections in `image` scoring at least `confidence_threshold`.
    async fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    bbox: [f64; 4],
    class: String,
    score: f64,
}

fn into_detections(
    response: DetectResponse,
    confidence_threshold: f64,
    object_classes: &HashSet<String>,
) -> Vec<Detection> {
    response
        .detections
        .into_iter()
        .filter(|d| d.score >= confidence_threshold)
        .filter_map(|d| {
            let class = if d.class == PERSON_CLASS {
                DetectionClass::Person
            } else if object_classes.contains(&d.class) {
                DetectionClass::Object(d.class)
            } else {
                return None;
            };
            let [x1, y1, x2, y2] = d.bbox;
            Some(Detection {
                bbox: BoundingBox::new(x1, y1, x2, y2),
                class,
                score: d.score,
            })
        })
        .collect()
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, DetectorError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| DetectorError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

// ---------------------------------------------------------------------------
// HttpDetector
// ---------------------------------------------------------------------------

pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
    object_classes: HashSet<String>,
}

impl HttpDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            object_classes: config.object_classes.iter().cloned().collect(),
        })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        let owned = image.clone();
        let body = tokio::task::spawn_blocking(move || encode_jpeg(&owned))
            .await
            .map_err(|e| DetectorError::Internal(e.to_string()))??;

        let response: DetectResponse = self
            .client
            .post(&self.url)
            .query(&[("confidence", confidence_threshold)])
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(into_detections(
            response,
            confidence_threshold,
            &self.object_classes,
        ))
    }
}
