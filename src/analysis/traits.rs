//! Analysis trait definitions

use crate::error::SyncResult;
use crate::model::{AudioBlock, BandVector};

/// Band analyzer trait - allows swapping the FFT analyzer for fixtures
///
/// Implementations must be pure: the same block always yields the same
/// band vector, and calls may happen from any thread.
pub trait BandAnalyzer {
    /// Reduce one block of samples to per-band energy values
    fn analyze(&self, block: &AudioBlock) -> SyncResult<BandVector>;

    /// Number of bands produced per block
    fn band_count(&self) -> usize;
}

impl<T: BandAnalyzer + ?Sized> BandAnalyzer for &T {
    fn analyze(&self, block: &AudioBlock) -> SyncResult<BandVector> {
        (**self).analyze(block)
    }

    fn band_count(&self) -> usize {
        (**self).band_count()
    }
}
