//! Decoded frame container.
//!
//! - `Frame`: one RGB24 raster pulled from a `FrameSource`. Bytes are private.
//!
//! Frames are ephemeral: a source produces one, the scan loop either drops it
//! (not sampled) or hands a shared reference to the detector and the optional
//! annotation sink, then drops it before pulling the next one.

use anyhow::{anyhow, Result};

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

/// One decoded RGB24 frame.
///
/// There is no `Clone`; the scan loop never needs more than one frame alive.
pub struct Frame {
    /// Private pixel data, row-major, tightly packed RGB24.
    pixels: Vec<u8>,

    /// 1-based position in the source stream (skipped frames included).
    /// The scan restamps it with its own pull count.
    pub index: u64,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Create a frame, checking that the buffer matches the dimensions.
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            index,
            width,
            height,
        })
    }

    /// Read-only pixel access for detectors and sinks.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        let px = self.pixels.get(offset..offset + RGB_CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }
}

/// Byte length of a tightly packed RGB24 frame.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::new(1, 2, 2, vec![0u8; 11]).is_err());
        assert!(Frame::new(1, 2, 2, vec![0u8; 12]).is_ok());
    }

    #[test]
    fn frame_rejects_zero_dimensions() {
        assert!(Frame::new(1, 0, 4, Vec::new()).is_err());
        assert!(Frame::new(1, 4, 0, Vec::new()).is_err());
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() -> Result<()> {
        let mut pixels = vec![0u8; 2 * 2 * 3];
        // (1, 1) is the last pixel.
        pixels[9] = 10;
        pixels[10] = 20;
        pixels[11] = 30;
        let frame = Frame::new(5, 2, 2, pixels)?;

        assert_eq!(frame.pixel(1, 1), Some([10, 20, 30]));
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.index, 5);
        Ok(())
    }
}
