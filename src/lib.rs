//! ArcPlan blueprint core
//!
//! Reduces a video of an interior space into a normalized 2-D blueprint: one
//! averaged position per recognized furniture/fixture class, expressed as
//! fractions of the frame width and height.
//!
//! # Pipeline
//!
//! 1. **Frame source** (`ingest`): decodes the video into numbered RGB frames.
//! 2. **Frame sampler** (`sampler`): only every `stride`th frame reaches the detector.
//! 3. **Detector** (`detect`): opaque backend returning class/box/confidence triples.
//! 4. **Spatial accumulator** (`accumulator`): interest filter + per-class centroids.
//! 5. **Blueprint reducer** (`reducer`): class relabeling, averaging, normalization.
//!
//! `scan::VideoScanner` drives the whole thing for one video and returns the
//! blueprint only after the source is exhausted.
//!
//! # Module Structure
//!
//! - `frame`: Decoded frame container
//! - `ingest`: Frame sources (local files, synthetic `stub://` videos)
//! - `detect`: Detector backends, registry, detection types
//! - `annotate`: Optional annotated-frame output
//! - `config`: File + environment configuration

pub mod accumulator;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod reducer;
pub mod sampler;
pub mod scan;

pub use accumulator::{
    ClassAccumulation, ClassPoints, InterestFilter, SpatialAccumulator, DEFAULT_INTEREST_CLASSES,
};
#[cfg(feature = "annotate")]
pub use annotate::JpegDirSink;
pub use annotate::FrameSink;
pub use config::{BlueprintConfig, DetectorSettings};
#[cfg(feature = "backend-tract")]
pub use detect::{TractBackend, TractSettings};
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectorBackend, MalformedDetection, Point,
    ScriptedBackend, COCO_CLASSES,
};
pub use frame::Frame;
pub use ingest::{FileOpener, FileSource, FrameSource, SourceOpener, SourceStats};
pub use reducer::{BlueprintEntry, BlueprintReducer, RenameRule};
pub use sampler::{FrameSampler, DEFAULT_STRIDE};
pub use scan::{Blueprint, ScanStats, VideoScanner};

/// Scan one video with the default policy: stride 5, the shipped interest
/// filter and the `clock` -> `outlet` relabeling.
///
/// Returns an empty list when the video cannot be opened.
pub fn process_video<D>(path: &str, detector: &mut D) -> anyhow::Result<Vec<BlueprintEntry>>
where
    D: DetectorBackend + ?Sized,
{
    VideoScanner::default()
        .scan(path, &FileOpener, detector)
        .map(Blueprint::into_entries)
}
