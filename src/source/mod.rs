//! Input boundary of the engine
//!
//! A `BlockSource` yields fixed-size PCM blocks until end of stream; a
//! `SourceSelector` decides which audio file feeds the engine.

mod decoder;
mod memory;
mod playlist;
mod traits;

pub use decoder::DecodedAudioSource;
pub use memory::MemorySource;
pub use playlist::{FileSelector, PlaylistEntry, PlaylistSelector, PLAYING_MARKER};
pub use traits::{BlockSource, SourceSelector};
