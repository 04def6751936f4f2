//! Accumulation to blueprint reduction.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::accumulator::{ClassAccumulation, ClassPoints};

/// Final output record: one averaged, frame-normalized position per class.
///
/// `x`/`y` are plain `f64`s; points from edge-clipped boxes may fall slightly
/// outside `[0, 1]` and are not clamped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlueprintEntry {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

/// One-to-one relabeling applied at reduction time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameRule {
    mappings: Vec<(String, String)>,
}

impl RenameRule {
    /// No relabeling at all.
    pub fn identity() -> Self {
        Self {
            mappings: Vec::new(),
        }
    }

    pub fn new<I, A, B>(mappings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut rule = Self::identity();
        for (from, to) in mappings {
            let (from, to) = (from.into(), to.into());
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(anyhow!("rename rule labels must be non-empty"));
            }
            if rule.mappings.iter().any(|(f, _)| *f == from) {
                return Err(anyhow!("rename rule maps '{}' more than once", from));
            }
            if rule.mappings.iter().any(|(_, t)| *t == to) {
                return Err(anyhow!("rename rule maps two labels onto '{}'", to));
            }
            rule.mappings.push((from, to));
        }
        Ok(rule)
    }

    /// Presented name for an accumulated class.
    pub fn apply<'a>(&'a self, class_name: &'a str) -> &'a str {
        self.mappings
            .iter()
            .find(|(from, _)| from == class_name)
            .map(|(_, to)| to.as_str())
            .unwrap_or(class_name)
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mappings.iter().map(|(f, t)| (f.as_str(), t.as_str()))
    }
}

impl Default for RenameRule {
    /// `clock` is presented as `outlet`.
    fn default() -> Self {
        Self {
            mappings: vec![("clock".to_string(), "outlet".to_string())],
        }
    }
}

/// Turns a finished accumulation into blueprint entries.
#[derive(Clone, Debug, Default)]
pub struct BlueprintReducer {
    rename: RenameRule,
}

impl BlueprintReducer {
    pub fn new(rename: RenameRule) -> Self {
        Self { rename }
    }

    /// Reduce an accumulation against the frame dimensions.
    ///
    /// Output order is the order of first qualifying detection. A renamed class
    /// takes the position of its source label. When renaming makes two
    /// classes share a presented name, their points are pooled at the
    /// position of whichever was seen first.
    pub fn reduce(
        &self,
        accumulation: ClassAccumulation,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<BlueprintEntry>> {
        if frame_width == 0 || frame_height == 0 {
            return Err(anyhow!(
                "cannot normalize against a {}x{} frame",
                frame_width,
                frame_height
            ));
        }

        let mut pooled: Vec<(String, ClassPoints)> = Vec::with_capacity(accumulation.len());
        for (class_name, points) in accumulation {
            let name = self.rename.apply(&class_name).to_string();
            match pooled.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, existing)) => existing.extend(points),
                None => pooled.push((name, points)),
            }
        }

        let width = f64::from(frame_width);
        let height = f64::from(frame_height);

        let entries = pooled
            .into_iter()
            .filter_map(|(name, points)| {
                let Some(mean) = points.mean() else {
                    log::warn!("class '{}' has no points; skipped", name);
                    return None;
                };
                Some(BlueprintEntry {
                    name,
                    x: mean.x / width,
                    y: mean.y / height,
                })
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Point;

    fn acc(entries: &[(&str, Vec<(f64, f64)>)]) -> ClassAccumulation {
        let mut acc = ClassAccumulation::new();
        for (name, points) in entries {
            for &(x, y) in points.iter() {
                acc.push(name, Point { x, y });
            }
        }
        acc
    }

    #[test]
    fn averages_and_normalizes() -> Result<()> {
        let reducer = BlueprintReducer::default();
        let entries = reducer.reduce(acc(&[("chair", vec![(50.0, 50.0), (150.0, 150.0)])]), 200, 200)?;
        assert_eq!(
            entries,
            vec![BlueprintEntry {
                name: "chair".to_string(),
                x: 0.5,
                y: 0.5,
            }]
        );
        Ok(())
    }

    #[test]
    fn width_and_height_normalize_independently() -> Result<()> {
        let entries =
            BlueprintReducer::default().reduce(acc(&[("tv", vec![(160.0, 120.0)])]), 640, 480)?;
        assert_eq!(entries[0].x, 0.25);
        assert_eq!(entries[0].y, 0.25);
        Ok(())
    }

    #[test]
    fn clock_is_presented_as_outlet_in_place() -> Result<()> {
        let entries = BlueprintReducer::default().reduce(
            acc(&[
                ("bed", vec![(10.0, 10.0)]),
                ("clock", vec![(20.0, 20.0)]),
                ("sink", vec![(30.0, 30.0)]),
            ]),
            100,
            100,
        )?;
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bed", "outlet", "sink"]);
        Ok(())
    }

    #[test]
    fn no_outlet_without_clock() -> Result<()> {
        let entries =
            BlueprintReducer::default().reduce(acc(&[("bed", vec![(10.0, 10.0)])]), 100, 100)?;
        assert!(entries.iter().all(|e| e.name != "outlet"));
        Ok(())
    }

    #[test]
    fn colliding_labels_are_pooled_at_first_position() -> Result<()> {
        let entries = BlueprintReducer::default().reduce(
            acc(&[
                ("outlet", vec![(0.0, 0.0)]),
                ("bed", vec![(50.0, 50.0)]),
                ("clock", vec![(100.0, 100.0)]),
            ]),
            100,
            100,
        )?;
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["outlet", "bed"]);
        assert_eq!(entries[0].x, 0.5);
        Ok(())
    }

    #[test]
    fn empty_accumulation_reduces_to_empty_list() -> Result<()> {
        let entries = BlueprintReducer::default().reduce(ClassAccumulation::new(), 100, 100)?;
        assert!(entries.is_empty());
        Ok(())
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let reducer = BlueprintReducer::default();
        assert!(reducer.reduce(ClassAccumulation::new(), 0, 100).is_err());
    }

    #[test]
    fn out_of_frame_points_are_not_clamped() -> Result<()> {
        let entries =
            BlueprintReducer::default().reduce(acc(&[("sofa", vec![(110.0, -5.0)])]), 100, 100)?;
        assert!(entries[0].x > 1.0);
        assert!(entries[0].y < 0.0);
        Ok(())
    }

    #[test]
    fn rename_rule_rejects_ambiguous_mappings() {
        assert!(RenameRule::new([("clock", "outlet"), ("clock", "plug")]).is_err());
        assert!(RenameRule::new([("clock", "outlet"), ("vase", "outlet")]).is_err());
        assert!(RenameRule::new([("clock", "")]).is_err());
        let identity = RenameRule::identity();
        assert_eq!(identity.apply("clock"), "clock");
    }

    #[test]
    fn entries_serialize_as_name_x_y() -> Result<()> {
        let entry = BlueprintEntry {
            name: "outlet".to_string(),
            x: 0.375,
            y: 0.5,
        };
        assert_eq!(
            serde_json::to_string(&entry)?,
            r#"{"name":"outlet","x":0.375,"y":0.5}"#
        );
        Ok(())
    }
}
