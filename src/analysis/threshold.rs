//! Adaptive per-channel thresholding
//!
//! Each channel keeps a threshold that creeps up while the band runs well
//! above it and decays after a sustained stretch of off blocks, so quiet
//! passages still light some channels. The controller is a state machine
//! keyed on call order: feed it blocks in sequence.

use crate::engine::config::{ThresholdConfig, DETAIL_LOG_LEVEL};
use crate::error::{SyncError, SyncResult};
use crate::model::{BandVector, ChannelIndex, ChannelVector};

/// Adaptive state of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    /// Current on/off threshold; always positive
    pub threshold: f64,
    /// Consecutive off decisions since the last on or decay
    pub consecutive_off: u32,
}

impl ChannelState {
    fn new(initial_threshold: f64) -> Self {
        Self {
            threshold: initial_threshold,
            consecutive_off: 0,
        }
    }
}

/// Turns band vectors into channel vectors, adapting thresholds as it goes
#[derive(Debug, Clone)]
pub struct ThresholdController {
    config: ThresholdConfig,
    states: Vec<ChannelState>,
}

impl ThresholdController {
    pub fn new(config: ThresholdConfig, channel_count: usize) -> Self {
        let states = vec![ChannelState::new(config.initial_threshold); channel_count];
        Self { config, states }
    }

    pub fn channel_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, channel: ChannelIndex) -> &ChannelState {
        &self.states[channel.get()]
    }

    pub fn states(&self) -> &[ChannelState] {
        &self.states
    }

    /// Classify one block and update every channel's state
    pub fn classify(&mut self, bands: &BandVector) -> SyncResult<ChannelVector> {
        if bands.len() != self.states.len() {
            return Err(SyncError::InvalidConfig(format!(
                "{} band values for {} channels",
                bands.len(),
                self.states.len()
            )));
        }

        let cfg = &self.config;
        let mut decisions = Vec::with_capacity(self.states.len());

        for (i, (state, &level)) in self.states.iter_mut().zip(bands.values()).enumerate() {
            if state.threshold < level * cfg.recalibration_ratio {
                state.threshold *= cfg.growth_factor;
                log::log!(
                    DETAIL_LOG_LEVEL,
                    "++++ channel: {}; limit: {:.3}",
                    i,
                    state.threshold
                );
            }

            let on = level > state.threshold;
            if on {
                state.consecutive_off = 0;
            } else {
                state.consecutive_off += 1;
                if state.consecutive_off > cfg.off_run_length {
                    state.consecutive_off = 0;
                    state.threshold = (state.threshold * cfg.decay_factor).max(f64::MIN_POSITIVE);
                }
                log::log!(
                    DETAIL_LOG_LEVEL,
                    "---- channel: {}; limit: {:.3}",
                    i,
                    state.threshold
                );
            }

            decisions.push(on);
        }

        Ok(ChannelVector::new(decisions))
    }
}
