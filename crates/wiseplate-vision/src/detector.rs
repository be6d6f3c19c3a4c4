//! Plate (tray) detection
//!
//! The plate model is a YOLOv5 export: input is a letterboxed RGB tensor,
//! output is `[1, N, 5 + classes]` rows of `cx, cy, w, h, objectness,
//! class scores...` in input-space pixels.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tracing::debug;
use wiseplate_types::{ModelError, RawDetection, Result};

use crate::preprocess::{letterbox_tensor, Letterbox};
use crate::registry::{InferenceModel, ModelOutput};

/// Find candidate food boxes on a tray image
pub trait PlateDetector {
    /// Detections in source-image pixels, highest confidence first
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;

    /// Category label for each detector class index
    fn class_names(&self) -> &[String];
}

/// Decoding thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// YOLOv5 plate detector backed by a registry model
pub struct YoloPlateDetector {
    model: Arc<dyn InferenceModel>,
    class_names: Vec<String>,
    config: DetectorConfig,
}

impl YoloPlateDetector {
    pub fn new(model: Arc<dyn InferenceModel>, class_names: Vec<String>) -> Self {
        Self {
            model,
            class_names,
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }
}

impl PlateDetector for YoloPlateDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (width, height) = image.dimensions();
        let (tensor, letterbox) = letterbox_tensor(image, self.config.input_size);
        let output = self.model.infer(&tensor)?;
        let detections = decode_yolov5(&output, &letterbox, width, height, &self.config)?;
        debug!(count = detections.len(), "Plate detections decoded");
        Ok(detections)
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Decode raw YOLOv5 output into source-image detections
///
/// Boxes are mapped back through the letterbox, clipped to the image,
/// filtered by confidence, then reduced with class-aware NMS. The result is
/// sorted by confidence descending.
pub fn decode_yolov5(
    output: &ModelOutput,
    letterbox: &Letterbox,
    image_width: u32,
    image_height: u32,
    config: &DetectorConfig,
) -> Result<Vec<RawDetection>> {
    let (rows, stride) = match output.shape.as_slice() {
        [1, rows, stride] if *stride > 5 => (*rows, *stride),
        shape => {
            return Err(ModelError::InvalidOutput(format!(
                "expected detector output [1, N, 5 + classes], got {:?}",
                shape
            ))
            .into())
        }
    };
    if output.data.len() < rows * stride {
        return Err(ModelError::InvalidOutput(format!(
            "detector output has {} values, shape needs {}",
            output.data.len(),
            rows * stride
        ))
        .into());
    }

    let max_x = image_width as f32;
    let max_y = image_height as f32;
    let mut candidates = Vec::new();

    for row in output.data.chunks_exact(stride).take(rows) {
        let objectness = row[4];
        if objectness <= config.confidence_threshold {
            continue;
        }

        let Some((class_index, class_score)) = row[5..]
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        let confidence = objectness * class_score;
        if confidence <= config.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
        let (x1, y1) = (x1.clamp(0.0, max_x), y1.clamp(0.0, max_y));
        let (x2, y2) = (x2.clamp(0.0, max_x), y2.clamp(0.0, max_y));
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(RawDetection {
            center_x: (x1 + x2) / 2.0,
            center_y: (y1 + y2) / 2.0,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
            class_index,
        });
    }

    Ok(non_max_suppression(
        candidates,
        config.iou_threshold,
        config.max_detections,
    ))
}

/// Class-aware NMS; returns kept boxes by confidence descending
pub fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && iou(k, &candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let (ax1, ay1, ax2, ay2) = corners(a);
    let (bx1, by1, bx2, by2) = corners(b);

    let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn corners(d: &RawDetection) -> (f32, f32, f32, f32) {
    (
        d.center_x - d.width / 2.0,
        d.center_y - d.height / 2.0,
        d.center_x + d.width / 2.0,
        d.center_y + d.height / 2.0,
    )
}
