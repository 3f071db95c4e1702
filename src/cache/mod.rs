//! Persistent light sequence cache
//!
//! One gzip-compressed artifact per audio source, stored beside it as
//! `.<file name>.sync.gz`. Each line holds one block's channel states as
//! comma-separated `0`/`1` fields.

mod store;

pub use store::{cache_path_for, LightSequenceCache};
