//! Data model shared by analysis, caching and the engine
//!
//! These types carry no behavior beyond validation; the analysis and
//! engine modules own all state transitions.

mod block;
mod channel;
mod record;

pub use block::{AudioBlock, BandVector};
pub use channel::{ChannelIndex, ChannelVector};
pub use record::SyncRecord;
