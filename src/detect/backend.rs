use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend is constructed once by the caller and handed to each scan by
/// mutable reference; there is no process-global model instance.
///
/// Implementations must:
/// - Treat the frame as read-only and not retain it beyond the `detect` call
/// - Report boxes in the frame's own pixel coordinates
/// - Only emit class names from `vocabulary()`
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Fixed set of class names this backend can emit.
    fn vocabulary(&self) -> &[&'static str];

    /// Run detection on a frame.
    ///
    /// Errors abort the current scan; there is no per-frame retry.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn vocabulary(&self) -> &[&'static str] {
        (**self).vocabulary()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
