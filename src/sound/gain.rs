//! Gain shared between a loop and all of its scheduled segments.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A gain value that every segment of one loop reads per sample, so a volume
/// change reaches overlapping segments at the same time.
#[derive(Debug, Clone)]
pub struct SharedGain(Arc<AtomicU32>);

impl SharedGain {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_value() {
        let gain = SharedGain::new(0.5);
        let segment_view = gain.clone();
        gain.set(0.0);
        assert_eq!(segment_view.get(), 0.0);
    }
}
