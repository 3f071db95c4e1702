use super::ChannelVector;

/// Ordered channel vectors for one playback, one per block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncRecord {
    rows: Vec<ChannelVector>,
}

impl SyncRecord {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn from_rows(rows: Vec<ChannelVector>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: ChannelVector) {
        self.rows.push(row);
    }

    pub fn get(&self, block: usize) -> Option<&ChannelVector> {
        self.rows.get(block)
    }

    pub fn rows(&self) -> &[ChannelVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the rows, if the record has any
    pub fn channel_count(&self) -> Option<usize> {
        self.rows.first().map(ChannelVector::len)
    }
}
