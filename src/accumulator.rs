//! Per-class spatial accumulation.
//!
//! Every qualifying detection contributes its box centroid to the collection of
//! its class. There is no track identity: the same physical object seen twice
//! in one frame contributes two points.

use std::collections::HashSet;

use anyhow::{anyhow, Result};

use crate::detect::{Detection, Point};

/// Classes the blueprint cares about, as shipped.
///
/// `clock` is a proxy for wall outlets, which the detector vocabulary lacks.
pub const DEFAULT_INTEREST_CLASSES: [&str; 19] = [
    "chair",
    "sofa",
    "bed",
    "tv",
    "laptop",
    "clock",
    "potted plant",
    "bottle",
    "cup",
    "book",
    "backpack",
    "handbag",
    "dining table",
    "toilet",
    "sink",
    "refrigerator",
    "oven",
    "microwave",
    "toaster",
];

/// Allow-list of class names. Everything else is discarded before accumulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterestFilter {
    classes: HashSet<String>,
}

impl InterestFilter {
    pub fn new<I, S>(classes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: HashSet<String> = classes
            .into_iter()
            .map(|c| {
                let c: String = c.into();
                c.trim().to_string()
            })
            .filter(|c| !c.is_empty())
            .collect();
        if classes.is_empty() {
            return Err(anyhow!("interest filter must allow at least one class"));
        }
        Ok(Self { classes })
    }

    pub fn allows(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes the detector can never emit, sorted. Logged as a warning.
    pub fn validate_against(&self, vocabulary: &[&str]) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .classes
            .iter()
            .filter(|c| !vocabulary.contains(&c.as_str()))
            .cloned()
            .collect();
        unknown.sort();
        if !unknown.is_empty() {
            log::warn!(
                "interest filter lists classes outside the detector vocabulary: {}",
                unknown.join(", ")
            );
        }
        unknown
    }
}

impl Default for InterestFilter {
    fn default() -> Self {
        Self {
            classes: DEFAULT_INTEREST_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Points gathered for one class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassPoints {
    points: Vec<Point>,
}

impl ClassPoints {
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn extend(&mut self, other: ClassPoints) {
        self.points.extend(other.points);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coordinate-wise mean in pixels, `None` when empty.
    pub fn mean(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point {
            x: sx / n,
            y: sy / n,
        })
    }
}

/// Class name to points, in order of each class's first qualifying detection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassAccumulation {
    entries: Vec<(String, ClassPoints)>,
}

impl ClassAccumulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point, creating the class entry on first sight.
    pub fn push(&mut self, class_name: &str, point: Point) {
        match self.entries.iter_mut().find(|(name, _)| name == class_name) {
            Some((_, points)) => points.push(point),
            None => {
                let mut points = ClassPoints::default();
                points.push(point);
                self.entries.push((class_name.to_string(), points));
            }
        }
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassPoints> {
        self.entries
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, points)| points)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.get(class_name).is_some()
    }

    /// Class names in insertion order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassPoints)> {
        self.entries.iter().map(|(name, points)| (name.as_str(), points))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.entries.iter().map(|(_, points)| points.len()).sum()
    }
}

impl IntoIterator for ClassAccumulation {
    type Item = (String, ClassPoints);
    type IntoIter = std::vec::IntoIter<(String, ClassPoints)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Consumes per-frame detections for one video.
///
/// Created fresh per scan and consumed by the reducer; nothing is shared
/// between videos.
pub struct SpatialAccumulator {
    filter: InterestFilter,
    min_confidence: f32,
    accumulation: ClassAccumulation,
    seen: u64,
    kept: u64,
}

impl SpatialAccumulator {
    pub fn new(filter: InterestFilter) -> Self {
        Self {
            filter,
            min_confidence: 0.0,
            accumulation: ClassAccumulation::new(),
            seen: 0,
            kept: 0,
        }
    }

    /// Discard detections below `min_confidence`. Default 0.0 keeps everything.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Fold one sampled frame's detections in.
    ///
    /// Every detection is validated first; a malformed one aborts with
    /// `MalformedDetection` and leaves the accumulation unchanged for this frame.
    pub fn observe(&mut self, detections: &[Detection]) -> Result<usize> {
        for detection in detections {
            detection.validate()?;
        }

        let mut kept = 0;
        for detection in detections {
            self.seen += 1;
            if !self.filter.allows(&detection.class_name)
                || detection.confidence < self.min_confidence
            {
                continue;
            }
            self.accumulation
                .push(&detection.class_name, detection.center());
            kept += 1;
        }
        self.kept += kept as u64;
        Ok(kept)
    }

    pub fn accumulation(&self) -> &ClassAccumulation {
        &self.accumulation
    }

    /// Detections offered so far, qualifying or not.
    pub fn detections_seen(&self) -> u64 {
        self.seen
    }

    /// Detections that contributed a point.
    pub fn detections_kept(&self) -> u64 {
        self.kept
    }

    pub fn into_accumulation(self) -> ClassAccumulation {
        self.accumulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, MalformedDetection};

    fn det(class: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(class, BoundingBox::new(x1, y1, x2, y2), 0.8).unwrap()
    }

    #[test]
    fn filters_and_orders_by_first_sighting() -> Result<()> {
        let mut acc = SpatialAccumulator::new(InterestFilter::default());

        acc.observe(&[det("person", 0.0, 0.0, 10.0, 10.0), det("tv", 0.0, 0.0, 10.0, 10.0)])?;
        acc.observe(&[det("chair", 0.0, 0.0, 2.0, 2.0), det("tv", 10.0, 10.0, 20.0, 20.0)])?;

        let names: Vec<&str> = acc.accumulation().class_names().collect();
        assert_eq!(names, vec!["tv", "chair"]);
        assert_eq!(acc.accumulation().get("tv").unwrap().len(), 2);
        assert!(!acc.accumulation().contains("person"));
        assert_eq!(acc.detections_seen(), 4);
        assert_eq!(acc.detections_kept(), 3);
        Ok(())
    }

    #[test]
    fn duplicates_within_a_frame_all_count() -> Result<()> {
        let mut acc = SpatialAccumulator::new(InterestFilter::default());
        let kept = acc.observe(&[
            det("chair", 0.0, 0.0, 10.0, 10.0),
            det("chair", 1.0, 1.0, 11.0, 11.0),
        ])?;
        assert_eq!(kept, 2);
        assert_eq!(acc.accumulation().total_points(), 2);
        Ok(())
    }

    #[test]
    fn empty_frame_is_a_no_op() -> Result<()> {
        let mut acc = SpatialAccumulator::new(InterestFilter::default());
        assert_eq!(acc.observe(&[])?, 0);
        assert!(acc.into_accumulation().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_detection_aborts_frame() {
        let mut acc = SpatialAccumulator::new(InterestFilter::default());
        let bad = Detection {
            class_name: "chair".to_string(),
            bbox: BoundingBox::new(10.0, 0.0, 0.0, 10.0),
            confidence: 0.9,
        };

        let err = acc
            .observe(&[det("tv", 0.0, 0.0, 1.0, 1.0), bad])
            .unwrap_err();

        assert!(err.downcast_ref::<MalformedDetection>().is_some());
        assert!(acc.accumulation().is_empty());
    }

    #[test]
    fn min_confidence_discards_weak_detections() -> Result<()> {
        let mut acc = SpatialAccumulator::new(InterestFilter::default()).with_min_confidence(0.5);
        let weak = Detection::new("bed", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.3)?;
        let strong = Detection::new("bed", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.7)?;
        assert_eq!(acc.observe(&[weak, strong])?, 1);
        Ok(())
    }

    #[test]
    fn mean_is_order_independent() {
        let mut forward = ClassPoints::default();
        let mut backward = ClassPoints::default();
        let points = [
            Point { x: 1.0, y: 2.0 },
            Point { x: 3.0, y: 8.0 },
            Point { x: 5.0, y: 5.0 },
        ];
        for p in points {
            forward.push(p);
        }
        for p in points.iter().rev() {
            backward.push(*p);
        }
        assert_eq!(forward.mean(), Some(Point { x: 3.0, y: 5.0 }));
        assert_eq!(forward.mean(), backward.mean());
        assert_eq!(ClassPoints::default().mean(), None);
    }

    #[test]
    fn interest_filter_reports_unknown_classes() -> Result<()> {
        let filter = InterestFilter::new(["chair", "sofa", "outlet"])?;
        let unknown = filter.validate_against(&crate::detect::COCO_CLASSES);
        assert_eq!(unknown, vec!["outlet".to_string(), "sofa".to_string()]);
        assert!(InterestFilter::new(Vec::<String>::new()).is_err());
        assert_eq!(InterestFilter::default().len(), 19);
        Ok(())
    }
}
