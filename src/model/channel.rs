use crate::error::{SyncError, SyncResult};
use std::fmt;

/// Index of a light channel, validated against the channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelIndex(usize);

impl ChannelIndex {
    pub fn new(index: usize, channel_count: usize) -> SyncResult<Self> {
        if index >= channel_count {
            return Err(SyncError::InvalidConfig(format!(
                "channel {} out of range (0..{})",
                index, channel_count
            )));
        }
        Ok(Self(index))
    }

    /// Every valid index for `channel_count` channels, in order
    pub fn all(channel_count: usize) -> impl Iterator<Item = ChannelIndex> {
        (0..channel_count).map(ChannelIndex)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On/off decision per channel for one block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelVector(Vec<bool>);

impl ChannelVector {
    pub fn new(states: Vec<bool>) -> Self {
        Self(states)
    }

    pub fn all_off(channel_count: usize) -> Self {
        Self(vec![false; channel_count])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: ChannelIndex) -> bool {
        self.0[index.get()]
    }

    pub fn states(&self) -> &[bool] {
        &self.0
    }

    /// Channels that are on, in ascending order
    pub fn lit(&self) -> impl Iterator<Item = ChannelIndex> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .map(|(i, _)| ChannelIndex(i))
    }
}

impl fmt::Display for ChannelVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &on in &self.0 {
            f.write_str(if on { "1" } else { "0" })?;
        }
        Ok(())
    }
}
