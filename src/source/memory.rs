//! In-memory block source

use super::traits::BlockSource;
use crate::model::AudioBlock;
use anyhow::Result;
use std::collections::VecDeque;

/// Block source backed by blocks already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    blocks: VecDeque<AudioBlock>,
    sample_rate: u32,
    audio_channels: u16,
    total_frames: usize,
}

impl MemorySource {
    pub fn new(blocks: Vec<AudioBlock>, sample_rate: u32, audio_channels: u16) -> Self {
        let total_frames = blocks.iter().map(AudioBlock::frames).sum();
        Self {
            blocks: blocks.into(),
            sample_rate,
            audio_channels,
            total_frames,
        }
    }

    /// Split interleaved samples into blocks of `block_frames` frames,
    /// zero-padding the last one
    pub fn from_samples(
        samples: &[i16],
        sample_rate: u32,
        audio_channels: u16,
        block_frames: usize,
    ) -> Self {
        let block_len = block_frames * usize::from(audio_channels);
        let blocks = samples
            .chunks(block_len.max(1))
            .map(|chunk| {
                AudioBlock::zero_padded(chunk.to_vec(), block_len, sample_rate, audio_channels)
            })
            .collect();
        Self::new(blocks, sample_rate, audio_channels)
    }

    /// Blocks not yet consumed
    pub fn remaining(&self) -> usize {
        self.blocks.len()
    }
}

impl BlockSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn audio_channels(&self) -> u16 {
        self.audio_channels
    }

    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        Ok(self.blocks.pop_front())
    }

    fn duration_secs(&self) -> Option<f64> {
        if self.sample_rate == 0 {
            return None;
        }
        Some(self.total_frames as f64 / f64::from(self.sample_rate))
    }
}
