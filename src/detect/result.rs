use std::fmt;

use serde::{Deserialize, Serialize};

/// Centroid of a bounding box, in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned box `(x1, y1, x2, y2)` in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from YOLO-style center/size coordinates.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    /// Geometric center. Computed in f64 so the reducer never mixes precisions.
    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 as f64 + self.x2 as f64) / 2.0,
            y: (self.y1 as f64 + self.y2 as f64) / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Clip to `[0, width] x [0, height]`.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// One object instance observed in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    /// Build a validated detection.
    ///
    /// Backends should construct detections through here; `SpatialAccumulator`
    /// re-validates anything it is handed, since fields are public.
    pub fn new(
        class_name: impl Into<String>,
        bbox: BoundingBox,
        confidence: f32,
    ) -> Result<Self, MalformedDetection> {
        let detection = Self {
            class_name: class_name.into(),
            bbox,
            confidence,
        };
        detection.validate()?;
        Ok(detection)
    }

    /// Check the structural invariants of a detection payload.
    pub fn validate(&self) -> Result<(), MalformedDetection> {
        if self.class_name.trim().is_empty() {
            return Err(MalformedDetection::MissingClass);
        }
        if !self.bbox.is_finite() || self.bbox.x1 > self.bbox.x2 || self.bbox.y1 > self.bbox.y2 {
            return Err(MalformedDetection::InvalidBox {
                class_name: self.class_name.clone(),
                bbox: self.bbox,
            });
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(MalformedDetection::InvalidConfidence {
                class_name: self.class_name.clone(),
                confidence: self.confidence,
            });
        }
        Ok(())
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2} ({:.1}, {:.1}, {:.1}, {:.1})",
            self.class_name,
            self.confidence,
            self.bbox.x1,
            self.bbox.y1,
            self.bbox.x2,
            self.bbox.y2
        )
    }
}

/// Detector output that violates the detection contract.
///
/// Aborts the current scan. Callers can `downcast_ref` an `anyhow::Error` to this
/// type to tell bad detector output apart from I/O failures.
#[derive(Clone, Debug, PartialEq)]
pub enum MalformedDetection {
    MissingClass,
    InvalidBox { class_name: String, bbox: BoundingBox },
    InvalidConfidence { class_name: String, confidence: f32 },
}

impl fmt::Display for MalformedDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedDetection::MissingClass => write!(f, "detection has no class name"),
            MalformedDetection::InvalidBox { class_name, bbox } => write!(
                f,
                "detection '{}' has invalid box ({}, {}, {}, {})",
                class_name, bbox.x1, bbox.y1, bbox.x2, bbox.y2
            ),
            MalformedDetection::InvalidConfidence {
                class_name,
                confidence,
            } => write!(
                f,
                "detection '{}' has confidence {} outside [0, 1]",
                class_name, confidence
            ),
        }
    }
}

impl std::error::Error for MalformedDetection {}

/// Non-maximum suppression, applied per class.
///
/// Keeps the highest-confidence box of every overlapping group whose IoU exceeds
/// `iou_threshold`. Boxes of different classes never suppress each other.
pub fn apply_nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::new();

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_name != detections[i].class_name {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(i);
    }

    keep.into_iter().map(|i| detections[i].clone()).collect()
}
