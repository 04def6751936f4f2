//! Video scan: the driving loop from frame source to blueprint.
//!
//! ```text
//! FrameSource -> FrameSampler -> DetectorBackend -> SpatialAccumulator
//!                                       (end of stream) -> BlueprintReducer
//! ```
//!
//! One scan owns one source and one accumulator. Frames are pulled strictly in
//! order and each detection call completes before the next frame is read.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::accumulator::{InterestFilter, SpatialAccumulator};
use crate::annotate::FrameSink;
use crate::detect::DetectorBackend;
use crate::ingest::{SourceGuard, SourceOpener};
use crate::reducer::{BlueprintEntry, BlueprintReducer, RenameRule};
use crate::sampler::FrameSampler;

/// Default interval for "processing frame N" progress lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 30;

/// Counters for one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub source_opened: bool,
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub detections_seen: u64,
    pub detections_kept: u64,
    pub width: u32,
    pub height: u32,
}

/// Result of a scan: the caller-facing entries plus counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blueprint {
    pub entries: Vec<BlueprintEntry>,
    pub stats: ScanStats,
}

impl Blueprint {
    pub fn entries(&self) -> &[BlueprintEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BlueprintEntry> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan configuration plus the driving loop.
#[derive(Clone, Debug)]
pub struct VideoScanner {
    sampler: FrameSampler,
    filter: InterestFilter,
    reducer: BlueprintReducer,
    min_confidence: f32,
    progress_every: u64,
}

impl VideoScanner {
    pub fn new(sampler: FrameSampler, filter: InterestFilter, rename: RenameRule) -> Self {
        Self {
            sampler,
            filter,
            reducer: BlueprintReducer::new(rename),
            min_confidence: 0.0,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Discard detections below `min_confidence` before they count.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Log progress every `n` frames read; 0 disables progress lines.
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    /// Scan a whole video and reduce it to a blueprint.
    ///
    /// A source that fails to open yields an empty blueprint and the detector
    /// is never called. Any detector error, malformed detection or mid-stream
    /// decode error aborts the scan and is returned.
    pub fn scan<O, D>(&self, path: &str, opener: &O, detector: &mut D) -> Result<Blueprint>
    where
        O: SourceOpener + ?Sized,
        D: DetectorBackend + ?Sized,
    {
        self.run(path, opener, detector, None)
    }

    /// `scan`, additionally handing every sampled frame to `sink`.
    pub fn scan_with_sink<O, D>(
        &self,
        path: &str,
        opener: &O,
        detector: &mut D,
        sink: &mut dyn FrameSink,
    ) -> Result<Blueprint>
    where
        O: SourceOpener + ?Sized,
        D: DetectorBackend + ?Sized,
    {
        let result = self.run(path, opener, detector, Some(&mut *sink));
        let finished = sink.finish().context("failed to finish annotation output");
        let blueprint = result?;
        finished?;
        Ok(blueprint)
    }

    fn run<O, D>(
        &self,
        path: &str,
        opener: &O,
        detector: &mut D,
        mut sink: Option<&mut dyn FrameSink>,
    ) -> Result<Blueprint>
    where
        O: SourceOpener + ?Sized,
        D: DetectorBackend + ?Sized,
    {
        let source = match opener.open(path) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("could not open video {}: {:#}", path, e);
                return Ok(Blueprint::default());
            }
        };
        let mut guard = SourceGuard::new(source);
        let (width, height) = guard.source().dimensions();

        log::info!(
            "scanning {} ({}x{}, stride {}) with detector '{}'",
            path,
            width,
            height,
            self.sampler.stride(),
            detector.name()
        );
        self.filter.validate_against(detector.vocabulary());

        let mut accumulator =
            SpatialAccumulator::new(self.filter.clone()).with_min_confidence(self.min_confidence);
        let mut stats = ScanStats {
            source_opened: true,
            width,
            height,
            ..ScanStats::default()
        };

        while let Some(mut frame) = guard
            .source()
            .read_frame()
            .with_context(|| format!("failed to read frame {} of {}", stats.frames_read + 1, path))?
        {
            stats.frames_read += 1;
            // Position in the pull order, whatever numbering the source uses.
            frame.index = stats.frames_read;
            if self.progress_every > 0 && stats.frames_read % self.progress_every == 0 {
                log::info!("processing frame {}...", stats.frames_read);
            }
            if !self.sampler.should_sample(frame.index) {
                continue;
            }

            stats.frames_sampled += 1;
            let detections = detector
                .detect(&frame)
                .with_context(|| format!("detector failed on frame {}", frame.index))?;
            let kept = accumulator
                .observe(&detections)
                .with_context(|| format!("malformed detection on frame {}", frame.index))?;
            log::debug!(
                "frame {}: {} detections, {} kept",
                frame.index,
                detections.len(),
                kept
            );

            if let Some(sink) = sink.as_deref_mut() {
                let relevant: Vec<_> = detections
                    .into_iter()
                    .filter(|d| {
                        self.filter.allows(&d.class_name) && d.confidence >= self.min_confidence
                    })
                    .collect();
                sink.write(&frame, &relevant)
                    .with_context(|| format!("failed to annotate frame {}", frame.index))?;
            }
        }

        let source_stats = guard.finish();
        stats.detections_seen = accumulator.detections_seen();
        stats.detections_kept = accumulator.detections_kept();

        let accumulation = accumulator.into_accumulation();
        let entries = if accumulation.is_empty() {
            Vec::new()
        } else {
            self.reducer.reduce(accumulation, width, height)?
        };

        log::info!(
            "scan of {} complete: {} frames read, {} sampled, {} blueprint entries",
            source_stats.path,
            stats.frames_read,
            stats.frames_sampled,
            entries.len()
        );

        Ok(Blueprint { entries, stats })
    }
}

impl Default for VideoScanner {
    fn default() -> Self {
        Self::new(
            FrameSampler::default(),
            InterestFilter::default(),
            RenameRule::default(),
        )
    }
}
