//! Local file frame source.
//!
//! This module provides `FileSource` for ingesting frames from local video files.
//! The file source is responsible for:
//! - Reading frames from a local video file (no network access)
//! - Decoding video frames in-memory to RGB24
//! - Numbering frames from 1 in stream order
//!
//! Paths of the form `stub://name?frames=N&width=W&height=H` open a deterministic
//! synthetic video instead, which needs no decoder.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceOpener, SourceStats};
use crate::frame::{rgb_len, Frame};

const STUB_SCHEME: &str = "stub://";
const DEFAULT_STUB_FRAMES: u64 = 10;
const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a local video file (or a `stub://` synthetic video).
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if let Some(spec) = path.strip_prefix(STUB_SCHEME) {
            let source = SyntheticFileSource::new(path, spec)?;
            log::info!(
                "FileSource: opened {} (synthetic, {} frames)",
                path,
                source.total_frames
            );
            return Ok(Self {
                backend: FileBackend::Synthetic(source),
            });
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            let source = FfmpegFileSource::open(path)?;
            log::info!("FileSource: opened {} (ffmpeg)", path);
            Ok(Self {
                backend: FileBackend::Ffmpeg(source),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "file ingestion requires the ingest-file-ffmpeg feature"
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &'static str {
        match &self.backend {
            FileBackend::Synthetic(_) => "file:synthetic",
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(_) => "file:ffmpeg",
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match &self.backend {
            FileBackend::Synthetic(source) => (source.width, source.height),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.dimensions(),
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.closed = true,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.close(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Fail when `path` is a local video this build has no decoder for.
///
/// `stub://` paths always pass, as do URLs, which `FileSource::open` rejects
/// on its own.
pub fn ensure_decoder(path: &str) -> Result<()> {
    if cfg!(feature = "ingest-file-ffmpeg")
        || path.starts_with(STUB_SCHEME)
        || !is_local_file_path(path)
    {
        return Ok(());
    }
    Err(anyhow!(
        "cannot decode '{}': built without the ingest-file-ffmpeg feature",
        path
    ))
}

/// Opens `FileSource`s. The default opener for scans.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOpener;

impl SourceOpener for FileOpener {
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FileSource::open(path)?))
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    path: String,
    total_frames: u64,
    width: u32,
    height: u32,
    frame_count: u64,
    closed: bool,
}

impl SyntheticFileSource {
    fn new(path: &str, spec: &str) -> Result<Self> {
        let mut source = Self {
            path: path.to_string(),
            total_frames: DEFAULT_STUB_FRAMES,
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            frame_count: 0,
            closed: false,
        };

        let (name, query) = spec.split_once('?').unwrap_or((spec, ""));
        if name.trim().is_empty() {
            return Err(anyhow!("synthetic source needs a name: {}", path));
        }
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed synthetic source option '{}'", pair))?;
            match key {
                "frames" => source.total_frames = parse_option(key, value)?,
                "width" => source.width = parse_option(key, value)?,
                "height" => source.height = parse_option(key, value)?,
                other => return Err(anyhow!("unknown synthetic source option '{}'", other)),
            }
        }
        rgb_len(source.width, source.height)?;
        Ok(source)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Err(anyhow!("read from closed source {}", self.path));
        }
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels()?;
        Frame::new(self.frame_count, self.width, self.height, pixels).map(Some)
    }

    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let mut pixels = vec![0u8; rgb_len(self.width, self.height)?];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        Ok(pixels)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.path.clone(),
        }
    }
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("synthetic source option '{}' has invalid value '{}'", key, value))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
