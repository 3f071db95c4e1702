//! Shared fixtures for integration tests

#![allow(dead_code)]

use synchronized_lights::model::AudioBlock;
use synchronized_lights::source::MemorySource;

pub const SAMPLE_RATE: u32 = 44100;
pub const BLOCK_FRAMES: usize = 2048;

/// Deterministic mono signal whose loudness and pitch change per block
pub fn block_samples(index: usize, block_frames: usize) -> Vec<i16> {
    let freqs = [90.0, 220.0, 440.0, 900.0, 1800.0, 3600.0, 7000.0, 12000.0];
    let freq = freqs[(index * 3) % freqs.len()];
    let amp = match index % 5 {
        0 => 16000.0,
        1 => 6000.0,
        2 => 300.0,
        3 => 9000.0,
        _ => 40.0,
    };
    (0..block_frames)
        .map(|n| {
            let t = (index * block_frames + n) as f64 / f64::from(SAMPLE_RATE);
            (amp * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
        })
        .collect()
}

pub fn blocks(range: std::ops::Range<usize>) -> Vec<AudioBlock> {
    range
        .map(|i| AudioBlock::new(block_samples(i, BLOCK_FRAMES), SAMPLE_RATE, 1))
        .collect()
}

pub fn source(range: std::ops::Range<usize>) -> MemorySource {
    MemorySource::new(blocks(range), SAMPLE_RATE, 1)
}
