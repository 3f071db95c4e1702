//! Synchronized Lights - drive light channels from audio spectra
//!
//! Each block of audio is reduced to per-band energies, classified into
//! on/off channel states by adaptive thresholds, and the resulting sequence
//! is cached beside the audio file so later playbacks replay it instead of
//! recomputing.

pub mod analysis;
pub mod cache;
pub mod engine;
pub mod error;
pub mod model;
pub mod source;

pub use engine::config::EngineConfig;
pub use engine::pipeline::SyncEngine;
pub use error::{CacheError, SyncError};
