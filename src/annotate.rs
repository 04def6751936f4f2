//! Annotated frame output.
//!
//! A `FrameSink` receives every sampled frame together with the detections
//! that contributed points, so an operator can check what the blueprint was
//! built from. Sinks never alter the blueprint.

use anyhow::Result;

use crate::detect::{BoundingBox, Detection};
use crate::frame::{Frame, RGB_CHANNELS};

/// Box colour for annotated frames.
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const BOX_THICKNESS: u32 = 2;

/// Receives sampled frames from a scan.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()>;

    /// Flush and release output resources. Called once per scan, on every exit path.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Draw an unfilled rectangle onto a packed RGB24 buffer, clipped to the frame.
pub fn draw_box(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    bbox: &BoundingBox,
    color: [u8; 3],
    thickness: u32,
) {
    if width == 0 || height == 0 {
        return;
    }
    let clipped = bbox.clip(width, height);
    let max_x = width - 1;
    let max_y = height - 1;
    let x1 = (clipped.x1.floor() as u32).min(max_x);
    let y1 = (clipped.y1.floor() as u32).min(max_y);
    let x2 = (clipped.x2.floor() as u32).min(max_x);
    let y2 = (clipped.y2.floor() as u32).min(max_y);

    let mut put = |x: u32, y: u32| {
        let offset = (y as usize * width as usize + x as usize) * RGB_CHANNELS;
        if let Some(px) = pixels.get_mut(offset..offset + RGB_CHANNELS) {
            px.copy_from_slice(&color);
        }
    };

    for t in 0..thickness {
        let top = (y1 + t).min(y2);
        let bottom = y2.saturating_sub(t).max(y1);
        for x in x1..=x2 {
            put(x, top);
            put(x, bottom);
        }
        let left = (x1 + t).min(x2);
        let right = x2.saturating_sub(t).max(x1);
        for y in y1..=y2 {
            put(left, y);
            put(right, y);
        }
    }
}

/// Copy a frame's pixels and draw every detection box onto the copy.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Vec<u8> {
    let mut pixels = frame.pixels().to_vec();
    for detection in detections {
        draw_box(
            &mut pixels,
            frame.width,
            frame.height,
            &detection.bbox,
            BOX_COLOR,
            BOX_THICKNESS,
        );
    }
    pixels
}

#[cfg(feature = "annotate")]
pub use jpeg::JpegDirSink;

#[cfg(feature = "annotate")]
mod jpeg {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};

    use super::{annotate, FrameSink};
    use crate::detect::Detection;
    use crate::frame::Frame;

    /// Writes each annotated sampled frame as `frame_NNNNNN.jpg` into a directory.
    pub struct JpegDirSink {
        dir: PathBuf,
        written: u64,
    }

    impl JpegDirSink {
        pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
            let dir = dir.as_ref().to_path_buf();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create annotation dir {}", dir.display()))?;
            Ok(Self { dir, written: 0 })
        }

        pub fn written(&self) -> u64 {
            self.written
        }
    }

    impl FrameSink for JpegDirSink {
        fn write(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
            let pixels = annotate(frame, detections);
            let image = image::RgbImage::from_raw(frame.width, frame.height, pixels)
                .context("annotated frame buffer does not match its dimensions")?;
            let path = self.dir.join(format!("frame_{:06}.jpg", frame.index));
            image
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            self.written += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            log::info!(
                "annotated {} frames into {}",
                self.written,
                self.dir.display()
            );
            Ok(())
        }
    }
}
