//! Frame ingestion sources.
//!
//! This module provides the frame source capability the scan consumes:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` videos (testing, demos)
//!
//! A source decodes a container into an ordered, finite sequence of `Frame`s with
//! fixed dimensions. The ingestion layer is responsible for:
//! - Assigning 1-based frame indices, skipped frames included
//! - Converting decoded pictures to tightly packed RGB24
//! - Releasing decoder resources on `close`
//!
//! The ingestion layer MUST NOT:
//! - Fetch remote URLs
//! - Store decoded frames to disk

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{ensure_decoder, FileOpener, FileSource};

/// Counters reported by a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub path: String,
}

/// An opened, readable video.
pub trait FrameSource {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Frame `(width, height)` in pixels, fixed for the life of the source.
    fn dimensions(&self) -> (u32, u32);

    /// Pull the next frame. `Ok(None)` signals end of stream.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Release decoder resources. Must be safe to call more than once.
    fn close(&mut self) {}

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Opens frame sources by path.
pub trait SourceOpener {
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceOpener for F
where
    F: Fn(&str) -> Result<Box<dyn FrameSource>>,
{
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>> {
        self(path)
    }
}

/// Scoped ownership of an opened source.
///
/// `close` runs exactly once: either explicitly through `finish`, or on drop
/// when the scan exits early with an error.
pub struct SourceGuard {
    source: Box<dyn FrameSource>,
    closed: bool,
}

impl SourceGuard {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            closed: false,
        }
    }

    pub fn source(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }

    /// Close the source and return its final stats.
    pub fn finish(mut self) -> SourceStats {
        self.close_once();
        self.source.stats()
    }

    fn close_once(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
            log::debug!("{}: source closed", self.source.name());
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.close_once();
    }
}
