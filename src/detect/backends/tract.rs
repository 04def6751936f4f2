#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{apply_nms, BoundingBox, Detection};
use crate::detect::vocabulary::{coco_class, COCO_CLASSES};
use crate::frame::{Frame, RGB_CHANNELS};

/// Tunables for the tract backend. Defaults match YOLOv8 inference defaults.
#[derive(Clone, Debug)]
pub struct TractSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for TractSettings {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Tract-based backend for YOLOv8-style ONNX object detectors.
///
/// Expects a single output of shape `[1, 4 + C, N]`: `cx, cy, w, h` in model
/// input pixels followed by `C` per-class scores. Frames are resized to the
/// model input with nearest-neighbour sampling and boxes are scaled back to
/// frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    settings: TractSettings,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: TractSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        3,
                        settings.input_height as usize,
                        settings.input_width as usize
                    ),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract backend loaded {} ({}x{} input)",
            model_path.display(),
            settings.input_width,
            settings.input_height
        );

        Ok(Self { model, settings })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let (in_w, in_h) = (
            self.settings.input_width as usize,
            self.settings.input_height as usize,
        );
        let (src_w, src_h) = (frame.width as usize, frame.height as usize);
        let pixels = frame.pixels();

        let input = tract_ndarray::Array4::from_shape_fn((1, 3, in_h, in_w), |(_, c, y, x)| {
            let sx = (x * src_w / in_w).min(src_w - 1);
            let sy = (y * src_h / in_h).min(src_h - 1);
            pixels[(sy * src_w + sx) * RGB_CHANNELS + c] as f32 / 255.0
        });

        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not rank 3")?;
        let (batch, rows, anchors) = preds.dim();
        if batch != 1 || rows <= 4 {
            return Err(anyhow!(
                "unexpected model output shape [{}, {}, {}]",
                batch,
                rows,
                anchors
            ));
        }
        let classes = rows - 4;

        let scale_x = frame.width as f32 / self.settings.input_width as f32;
        let scale_y = frame.height as f32 / self.settings.input_height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut best = (0usize, f32::NEG_INFINITY);
            for c in 0..classes {
                let score = preds[[0, 4 + c, a]];
                if score > best.1 {
                    best = (c, score);
                }
            }
            let (class_id, score) = best;
            if score.is_nan() || score < self.settings.confidence_threshold {
                continue;
            }
            let Some(class_name) = coco_class(class_id) else {
                continue;
            };

            let bbox = BoundingBox::from_center(
                preds[[0, 0, a]] * scale_x,
                preds[[0, 1, a]] * scale_y,
                preds[[0, 2, a]] * scale_x,
                preds[[0, 3, a]] * scale_y,
            )
            .clip(frame.width, frame.height);

            candidates.push(Detection::new(class_name, bbox, score.min(1.0))?);
        }

        let mut kept = apply_nms(candidates, self.settings.iou_threshold);
        kept.truncate(self.settings.max_detections);
        Ok(kept)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn vocabulary(&self) -> &[&'static str] {
        &COCO_CLASSES
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }
}
