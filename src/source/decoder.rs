//! Streaming audio decoding with symphonia
//!
//! Packets are decoded on demand and re-chunked into blocks of interleaved
//! i16 samples, so only one block's worth of PCM is held at a time.

use super::traits::BlockSource;
use crate::model::AudioBlock;
use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Block source decoding an audio file of any supported container/codec
pub struct DecodedAudioSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    audio_channels: u16,
    block_len: usize,
    duration_secs: Option<f64>,
    /// Decoded samples not yet handed out
    pending: Vec<i16>,
    exhausted: bool,
}

impl DecodedAudioSource {
    /// Open `path` and prepare to yield blocks of `block_frames` frames
    pub fn open(path: &Path, block_frames: usize) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {:?}", path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(ext.to_str().unwrap_or(""));
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("Failed to probe audio format: {:?}", path))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio track found")?;

        let track_id = track.id;
        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .context("No sample rate in audio track")?;
        let audio_channels = params
            .channels
            .map(|c| c.count())
            .context("No channel layout in audio track")?;
        let audio_channels =
            u16::try_from(audio_channels).context("Too many channels in audio track")?;
        let duration_secs = params
            .n_frames
            .map(|frames| frames as f64 / f64::from(sample_rate));

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        log::debug!(
            "Opened {:?}: {} Hz, {} channel(s), {:?} s",
            path,
            sample_rate,
            audio_channels,
            duration_secs
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            audio_channels,
            block_len: block_frames * usize::from(audio_channels),
            duration_secs,
            pending: Vec::new(),
            exhausted: false,
        })
    }

    /// Decode packets until a full block is buffered or the stream ends
    fn fill(&mut self) -> Result<()> {
        while self.pending.len() < self.block_len && !self.exhausted {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    // Anything but a clean EOF is a failed stream, not its end
                    self.exhausted = true;
                    return Err(e).context("Failed to read audio packet");
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    log::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            if spec.channels.count() != usize::from(self.audio_channels) {
                anyhow::bail!(
                    "Channel count changed mid-stream: {} -> {}",
                    self.audio_channels,
                    spec.channels.count()
                );
            }

            let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            self.pending.extend_from_slice(sample_buf.samples());
        }
        Ok(())
    }
}

impl BlockSource for DecodedAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn audio_channels(&self) -> u16 {
        self.audio_channels
    }

    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        self.fill()?;

        if self.pending.len() >= self.block_len {
            let rest = self.pending.split_off(self.block_len);
            let samples = std::mem::replace(&mut self.pending, rest);
            return Ok(Some(AudioBlock::new(
                samples,
                self.sample_rate,
                self.audio_channels,
            )));
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        // Final partial block
        let samples = std::mem::take(&mut self.pending);
        Ok(Some(AudioBlock::zero_padded(
            samples,
            self.block_len,
            self.sample_rate,
            self.audio_channels,
        )))
    }

    fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }
}
