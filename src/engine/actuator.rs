//! Output boundary: turning channel vectors into light changes

use super::config::DETAIL_LOG_LEVEL;
use crate::error::SyncError;
use crate::model::ChannelVector;
use anyhow::Result;
use std::io::Write;

/// Physical header pins (BOARD numbering) for the canonical 8 channels
pub const DEFAULT_PINS: [u8; 8] = [11, 12, 13, 15, 16, 18, 22, 7];

/// Receives one channel vector per block, in block order
pub trait ChannelActuator {
    fn apply(&mut self, vector: &ChannelVector) -> Result<()>;

    /// Switch every channel off (run start and end)
    fn all_off(&mut self, channel_count: usize) -> Result<()> {
        self.apply(&ChannelVector::all_off(channel_count))
    }
}

impl<T: ChannelActuator + ?Sized> ChannelActuator for &mut T {
    fn apply(&mut self, vector: &ChannelVector) -> Result<()> {
        (**self).apply(vector)
    }

    fn all_off(&mut self, channel_count: usize) -> Result<()> {
        (**self).all_off(channel_count)
    }
}

/// Discards every vector (cache precomputation)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActuator;

impl ChannelActuator for NullActuator {
    fn apply(&mut self, _vector: &ChannelVector) -> Result<()> {
        Ok(())
    }
}

/// Keeps every emitted vector in order
#[derive(Debug, Default, Clone)]
pub struct RecordingActuator {
    emitted: Vec<ChannelVector>,
    resets: usize,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-block vectors, excluding all-off resets
    pub fn emitted(&self) -> &[ChannelVector] {
        &self.emitted
    }

    /// Number of all-off resets seen
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl ChannelActuator for RecordingActuator {
    fn apply(&mut self, vector: &ChannelVector) -> Result<()> {
        self.emitted.push(vector.clone());
        Ok(())
    }

    fn all_off(&mut self, _channel_count: usize) -> Result<()> {
        self.resets += 1;
        Ok(())
    }
}

/// Renders each block as a row of lamps and logs pin level changes
pub struct ConsoleActuator<W: Write> {
    out: W,
    pins: Vec<u8>,
    last: Option<ChannelVector>,
}

impl<W: Write> ConsoleActuator<W> {
    /// `pins[i]` is the physical output driven by channel `i`
    pub fn new(out: W, pins: Vec<u8>) -> Self {
        Self {
            out,
            pins,
            last: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(vector: &ChannelVector) -> String {
        vector
            .states()
            .iter()
            .map(|&on| if on { "●" } else { "○" })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<W: Write> ChannelActuator for ConsoleActuator<W> {
    fn apply(&mut self, vector: &ChannelVector) -> Result<()> {
        if vector.len() != self.pins.len() {
            return Err(SyncError::InvalidConfig(format!(
                "{} channels but {} pins mapped",
                vector.len(),
                self.pins.len()
            ))
            .into());
        }

        for (i, (&on, &pin)) in vector.states().iter().zip(&self.pins).enumerate() {
            let was_on = self.last.as_ref().map(|l| l.states()[i]);
            if was_on != Some(on) {
                let level = if on { "HIGH" } else { "LOW" };
                log::log!(DETAIL_LOG_LEVEL, "pin {} -> {}", pin, level);
            }
        }

        writeln!(self.out, "{}", Self::render(vector))?;
        self.last = Some(vector.clone());
        Ok(())
    }
}
