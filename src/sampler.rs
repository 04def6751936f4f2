//! Stride-based frame sampling.

use anyhow::{anyhow, Result};

/// Default detection stride: every 5th frame is sent to the detector.
pub const DEFAULT_STRIDE: u64 = 5;

/// Decides which frames reach the detector.
///
/// Purely index based and deterministic: the same video and stride always yield
/// the same sampled indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSampler {
    stride: u64,
}

impl FrameSampler {
    pub fn new(stride: u64) -> Result<Self> {
        if stride == 0 {
            return Err(anyhow!("sampling stride must be at least 1"));
        }
        Ok(Self { stride })
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// `index` is 1-based and counts every frame pulled, sampled or not.
    pub fn should_sample(&self, index: u64) -> bool {
        index % self.stride == 0
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stride_samples_every_fifth_frame() {
        let sampler = FrameSampler::default();
        let sampled: Vec<u64> = (1..=16).filter(|&i| sampler.should_sample(i)).collect();
        assert_eq!(sampled, vec![5, 10, 15]);
    }

    #[test]
    fn stride_one_samples_everything() -> Result<()> {
        let sampler = FrameSampler::new(1)?;
        assert!((1..=10).all(|i| sampler.should_sample(i)));
        Ok(())
    }

    #[test]
    fn zero_stride_is_rejected() {
        assert!(FrameSampler::new(0).is_err());
    }
}
