use std::sync::Arc;

/// Fixed-size block of interleaved signed 16-bit PCM samples
///
/// Cloning is cheap; the samples are shared and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    samples: Arc<[i16]>,
    sample_rate: u32,
    audio_channels: u16,
}

impl AudioBlock {
    pub fn new(samples: Vec<i16>, sample_rate: u32, audio_channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            audio_channels,
        }
    }

    /// Build a block from a short tail, padding with silence up to `len` samples
    pub fn zero_padded(
        mut samples: Vec<i16>,
        len: usize,
        sample_rate: u32,
        audio_channels: u16,
    ) -> Self {
        samples.resize(len.max(samples.len()), 0);
        Self::new(samples, sample_rate, audio_channels)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn audio_channels(&self) -> u16 {
        self.audio_channels
    }

    /// Number of frames (samples per audio channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.audio_channels.max(1))
    }
}

/// Mean spectral magnitude per band, clipped to `[0, 100]`
#[derive(Debug, Clone, PartialEq)]
pub struct BandVector(Vec<f64>);

impl BandVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for BandVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}
