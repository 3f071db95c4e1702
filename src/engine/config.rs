//! Engine configuration
//!
//! Every constant the engine depends on lives here so fixtures can run
//! against non-canonical values. Defaults reproduce the canonical show:
//! 8 channels, 4096-frame blocks, bands from 0 Hz to 15 kHz.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Canonical band cut-points in Hz (8 bands)
pub const DEFAULT_BAND_EDGES_HZ: [f64; 9] = [
    0.0, 156.0, 313.0, 625.0, 1250.0, 2500.0, 5000.0, 10000.0, 15000.0,
];

/// Canonical per-channel weights (powers of two)
pub const DEFAULT_WEIGHTS: [u32; 8] = [2, 2, 4, 4, 8, 16, 32, 16];

/// Level of per-block detail: threshold movement and pin changes
pub const DETAIL_LOG_LEVEL: log::Level = log::Level::Debug;

/// Log filter for a CLI verbosity: 0 warnings, 1 progress, 2 per-block detail
pub fn verbosity_filter(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => DETAIL_LOG_LEVEL.to_level_filter(),
    }
}

/// What to do with a band whose bin range is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyBandPolicy {
    /// Refuse to build an analyzer for that sample rate
    Reject,
    /// Report 0.0 for the band
    Zero,
}

/// What replay emits once the cached record runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustedCachePolicy {
    /// Leave the last cached vector in place
    FreezeLast,
    /// Switch every channel off
    AllOff,
    /// Compute the remaining blocks fresh
    Recompute,
}

/// Band analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Ascending band cut-points in Hz; `channel_count + 1` entries
    pub band_edges_hz: Vec<f64>,

    /// Per-channel multipliers applied before normalization
    pub weights: Vec<u32>,

    /// Divisor bringing weighted magnitudes into roughly 0-100
    pub normalization: f64,

    pub empty_band_policy: EmptyBandPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            band_edges_hz: DEFAULT_BAND_EDGES_HZ.to_vec(),
            weights: DEFAULT_WEIGHTS.to_vec(),
            normalization: 100_000.0,
            empty_band_policy: EmptyBandPolicy::Reject,
        }
    }
}

/// Adaptive threshold settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Starting threshold for every channel
    pub initial_threshold: f64,

    /// Multiplier applied when the signal runs well above threshold
    pub growth_factor: f64,

    /// Multiplier applied after a long run of off blocks
    pub decay_factor: f64,

    /// Threshold grows while it is below `band * recalibration_ratio`
    pub recalibration_ratio: f64,

    /// Off blocks tolerated before the threshold decays
    pub off_run_length: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 5.0,
            growth_factor: 1.2,
            decay_factor: 0.8,
            recalibration_ratio: 0.6,
            off_run_length: 10,
        }
    }
}

/// Configuration for a synchronization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per analysis block
    pub block_frames: usize,

    pub analysis: AnalysisConfig,

    pub threshold: ThresholdConfig,

    /// Replay behavior past the end of a short cache
    pub exhausted_policy: ExhaustedCachePolicy,

    /// Sleep so that each emission lands on its block's wall-clock boundary
    pub realtime: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_frames: 4096,
            analysis: AnalysisConfig::default(),
            threshold: ThresholdConfig::default(),
            exhausted_policy: ExhaustedCachePolicy::FreezeLast,
            realtime: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdConfig) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_exhausted_policy(mut self, policy: ExhaustedCachePolicy) -> Self {
        self.exhausted_policy = policy;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Number of light channels, implied by the band table
    pub fn channel_count(&self) -> usize {
        self.analysis.band_edges_hz.len().saturating_sub(1)
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> SyncResult<()> {
        let channels = self.channel_count();
        let invalid = |msg: String| Err(SyncError::InvalidConfig(msg));

        if channels == 0 {
            return invalid("band table needs at least two edges".into());
        }
        if self.analysis.weights.len() != channels {
            return invalid(format!(
                "{} weights for {} channels",
                self.analysis.weights.len(),
                channels
            ));
        }
        if let Some(w) = self.analysis.band_edges_hz.windows(2).find(|w| !(w[0] < w[1])) {
            return invalid(format!("band edges not ascending at {} -> {}", w[0], w[1]));
        }
        if self.analysis.band_edges_hz[0] < 0.0 {
            return invalid("band edges must be non-negative".into());
        }
        if !(self.analysis.normalization > 0.0) {
            return invalid("normalization must be positive".into());
        }
        if self.block_frames < 2 {
            return invalid(format!("block_frames {} is too small", self.block_frames));
        }

        let t = &self.threshold;
        if !(t.initial_threshold > 0.0) {
            return invalid("initial_threshold must be positive".into());
        }
        if !(t.growth_factor > 1.0) {
            return invalid("growth_factor must exceed 1".into());
        }
        if !(t.decay_factor > 0.0 && t.decay_factor < 1.0) {
            return invalid("decay_factor must lie in (0, 1)".into());
        }
        if !(t.recalibration_ratio > 0.0) {
            return invalid("recalibration_ratio must be positive".into());
        }
        if t.off_run_length == 0 {
            return invalid("off_run_length must be at least 1".into());
        }

        Ok(())
    }
}
