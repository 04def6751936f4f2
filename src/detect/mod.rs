//! Object detection capability.
//!
//! The detector is an opaque collaborator: given a frame it returns zero or more
//! `Detection`s from a fixed vocabulary. Backends:
//! - `ScriptedBackend`: replays recorded detections (tests, demos)
//! - `TractBackend`: YOLOv8-style ONNX model (feature: backend-tract)

mod backend;
mod backends;
mod registry;
mod result;
mod vocabulary;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, TractSettings};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{apply_nms, BoundingBox, Detection, MalformedDetection, Point};
pub use vocabulary::{coco_class, COCO_CLASSES};
