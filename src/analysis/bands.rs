//! FFT band energy analysis
//!
//! A block of interleaved i16 samples is transformed as one real signal.
//! Only the non-negative half of the spectrum is kept, minus its final
//! (Nyquist) bin, so `len / 2` magnitudes remain. Band edges in Hz map to
//! bin indices with `floor(2 * block_frames * hz / sample_rate)`.

use super::traits::BandAnalyzer;
use crate::engine::config::{EmptyBandPolicy, EngineConfig};
use crate::error::{SyncError, SyncResult};
use crate::model::{AudioBlock, BandVector};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::ops::Range;
use std::sync::Arc;

/// Upper bound of every band value after normalization
const MAX_LEVEL: f64 = 100.0;

/// Spectral band analyzer bound to one block shape and sample rate
pub struct FrequencyBandAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    sample_rate: u32,
    block_len: usize,
    /// Bin range per band, already clipped to the retained spectrum
    bands: Vec<Range<usize>>,
    weights: Vec<f64>,
    normalization: f64,
}

impl FrequencyBandAnalyzer {
    /// Build an analyzer for blocks of `config.block_frames` frames of
    /// `audio_channels` interleaved channels at `sample_rate`
    ///
    /// Fails with `DegenerateBand` when a band covers no bins and the
    /// policy is `Reject`.
    pub fn new(config: &EngineConfig, sample_rate: u32, audio_channels: u16) -> SyncResult<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(SyncError::InvalidConfig("sample rate must be positive".into()));
        }
        if audio_channels == 0 {
            return Err(SyncError::InvalidConfig("audio stream has no channels".into()));
        }

        let block_len = config.block_frames * usize::from(audio_channels);
        let retained = block_len / 2;

        let edges: Vec<usize> = config
            .analysis
            .band_edges_hz
            .iter()
            .map(|&hz| bin_for_frequency(hz, config.block_frames, sample_rate).min(retained))
            .collect();

        let mut bands = Vec::with_capacity(edges.len() - 1);
        for (band, pair) in edges.windows(2).enumerate() {
            let range = pair[0]..pair[1];
            if range.is_empty() && config.analysis.empty_band_policy == EmptyBandPolicy::Reject {
                return Err(SyncError::DegenerateBand {
                    band,
                    low_bin: range.start,
                    high_bin: range.end,
                    sample_rate,
                });
            }
            bands.push(range);
        }

        log::debug!(
            "Band layout at {} Hz, {} samples/block: {:?}",
            sample_rate,
            block_len,
            bands
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(block_len);

        Ok(Self {
            fft,
            sample_rate,
            block_len,
            bands,
            weights: config.analysis.weights.iter().map(|&w| f64::from(w)).collect(),
            normalization: config.analysis.normalization,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples expected per block
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Bin range averaged for each band
    pub fn band_bins(&self) -> &[Range<usize>] {
        &self.bands
    }

    /// Magnitudes of the retained half spectrum
    fn magnitudes(&self, samples: &[i16]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(f64::from(s), 0.0))
            .collect();
        self.fft.process(&mut buffer);

        buffer.truncate(self.block_len / 2);
        buffer.iter().map(|c| c.norm()).collect()
    }
}

impl BandAnalyzer for FrequencyBandAnalyzer {
    fn analyze(&self, block: &AudioBlock) -> SyncResult<BandVector> {
        if block.len() != self.block_len || block.sample_rate() != self.sample_rate {
            return Err(SyncError::BlockMismatch {
                expected: self.block_len,
                expected_rate: self.sample_rate,
                found: block.len(),
                found_rate: block.sample_rate(),
            });
        }

        let power = self.magnitudes(block.samples());

        let levels = self
            .bands
            .iter()
            .zip(&self.weights)
            .map(|(range, weight)| {
                let mean = mean(&power[range.clone()]);
                (mean * weight / self.normalization).clamp(0.0, MAX_LEVEL)
            })
            .collect();

        Ok(BandVector::new(levels))
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }
}

/// FFT bin index for a frequency
pub fn bin_for_frequency(hz: f64, block_frames: usize, sample_rate: u32) -> usize {
    (2.0 * block_frames as f64 * hz / f64::from(sample_rate)).floor() as usize
}

/// Mean of a slice; empty bands (only reachable under `Zero`) yield 0
#[inline]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::AnalysisConfig;

    /// 4-sample blocks at 8 Hz; edges map 1:1 onto bins
    fn tiny_config() -> EngineConfig {
        EngineConfig::default()
            .with_block_frames(4)
            .with_analysis(AnalysisConfig {
                band_edges_hz: vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0],
                normalization: 1.0,
                empty_band_policy: EmptyBandPolicy::Zero,
                ..AnalysisConfig::default()
            })
    }

    #[test]
    fn test_bin_for_frequency() {
        assert_eq!(bin_for_frequency(0.0, 4096, 44100), 0);
        // 2 * 4096 * 156 / 44100 = 28.97
        assert_eq!(bin_for_frequency(156.0, 4096, 44100), 28);
        assert_eq!(bin_for_frequency(15000.0, 4096, 44100), 2786);
    }

    #[test]
    fn test_canonical_layout_at_cd_rate() {
        let analyzer = FrequencyBandAnalyzer::new(&EngineConfig::default(), 44100, 2).unwrap();
        assert_eq!(analyzer.block_len(), 8192);
        assert_eq!(analyzer.band_bins()[0], 0..28);
        assert_eq!(analyzer.band_bins()[7], 1857..2786);
    }

    #[test]
    fn test_silence_is_zero() {
        let analyzer = FrequencyBandAnalyzer::new(&EngineConfig::default(), 44100, 2).unwrap();
        let block = AudioBlock::new(vec![0; 8192], 44100, 2);
        let bands = analyzer.analyze(&block).unwrap();
        assert_eq!(bands.len(), 8);
        assert!(bands.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_nyquist_bin_is_discarded() {
        // Alternating signal puts all energy in the Nyquist bin, which is dropped
        let analyzer = FrequencyBandAnalyzer::new(&tiny_config(), 8, 1).unwrap();
        let block = AudioBlock::new(vec![100, -100, 100, -100], 8, 1);
        let bands = analyzer.analyze(&block).unwrap();
        assert!(bands.values().iter().all(|&v| v.abs() < 1e-9));
    }

    #[test]
    fn test_energy_lands_in_nyquist_adjacent_band() {
        let analyzer = FrequencyBandAnalyzer::new(&tiny_config(), 8, 1).unwrap();
        // Bins after dropping Nyquist: [0, 1]; bin 1 lies in band 3 ([1, 2))
        assert_eq!(analyzer.band_bins()[1], 0..1);
        assert_eq!(analyzer.band_bins()[3], 1..2);

        // x = [100, 0, -100, 0] -> |X1| = 200, X0 = 0
        let block = AudioBlock::new(vec![100, 0, -100, 0], 8, 1);
        let bands = analyzer.analyze(&block).unwrap();

        for (i, &v) in bands.values().iter().enumerate() {
            if i == 3 {
                // 200 * weight 4 / normalization 1, clipped to 100
                assert_eq!(v, 100.0);
            } else {
                assert!(v.abs() < 1e-9, "band {} should be silent", i);
            }
        }
    }

    #[test]
    fn test_weighting_and_normalization() {
        let mut config = tiny_config();
        config.analysis.normalization = 100.0;
        let analyzer = FrequencyBandAnalyzer::new(&config, 8, 1).unwrap();
        let block = AudioBlock::new(vec![100, 0, -100, 0], 8, 1);
        let bands = analyzer.analyze(&block).unwrap();
        assert!((bands.values()[3] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_band_rejected_by_default() {
        let mut config = tiny_config();
        config.analysis.empty_band_policy = EmptyBandPolicy::Reject;
        let result = FrequencyBandAnalyzer::new(&config, 8, 1);
        assert!(matches!(
            result,
            Err(SyncError::DegenerateBand { band: 0, low_bin: 0, high_bin: 0, .. })
        ));
    }

    #[test]
    fn test_low_sample_rate_is_degenerate() {
        // At 1 kHz nearly every canonical band collapses past the spectrum end
        let result = FrequencyBandAnalyzer::new(&EngineConfig::default(), 1000, 1);
        assert!(matches!(result, Err(SyncError::DegenerateBand { .. })));
    }

    #[test]
    fn test_block_mismatch() {
        let analyzer = FrequencyBandAnalyzer::new(&EngineConfig::default(), 44100, 2).unwrap();
        let block = AudioBlock::new(vec![0; 4096], 44100, 1);
        assert!(matches!(
            analyzer.analyze(&block),
            Err(SyncError::BlockMismatch { expected: 8192, found: 4096, .. })
        ));
    }

    #[test]
    fn test_values_clipped_to_range() {
        let mut config = EngineConfig::default();
        config.analysis.normalization = 1.0;
        let analyzer = FrequencyBandAnalyzer::new(&config, 44100, 1).unwrap();
        let samples = (0..4096)
            .map(|i| if (i / 8) % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let bands = analyzer.analyze(&AudioBlock::new(samples, 44100, 1)).unwrap();
        assert!(bands.values().iter().all(|&v| (0.0..=100.0).contains(&v)));
        assert!(bands.values().iter().any(|&v| v == 100.0));
    }
}
