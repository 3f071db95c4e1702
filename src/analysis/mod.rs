//! Signal analysis layer
//!
//! `FrequencyBandAnalyzer` reduces a block of PCM samples to per-band
//! energies; `ThresholdController` turns those energies into on/off
//! decisions with adaptive thresholds. The analyzer sits behind the
//! `BandAnalyzer` trait so the engine can be driven by fixtures.

mod bands;
mod threshold;
mod traits;

pub use bands::{bin_for_frequency, FrequencyBandAnalyzer};
pub use threshold::{ChannelState, ThresholdController};
pub use traits::BandAnalyzer;
