//! Source trait definitions

use crate::model::AudioBlock;
use anyhow::Result;
use std::path::PathBuf;

/// Stream of fixed-size audio blocks
pub trait BlockSource {
    /// Sample rate of every block this source yields
    fn sample_rate(&self) -> u32;

    /// Interleaved audio channels per frame
    fn audio_channels(&self) -> u16;

    /// Next block, or `None` at end of stream
    fn next_block(&mut self) -> Result<Option<AudioBlock>>;

    /// Total playback length, when the container reports it
    fn duration_secs(&self) -> Option<f64> {
        None
    }
}

/// Chooses the audio file to play
pub trait SourceSelector {
    fn select(&self) -> Result<PathBuf>;
}
