//! Offline cache precomputation
//!
//! Walks a music directory and runs a fresh, non-actuating pass over every
//! audio file that has no cache yet, so later playback can replay instead
//! of paying for the FFT in real time.

use super::actuator::NullActuator;
use super::config::EngineConfig;
use super::pipeline::SyncEngine;
use crate::cache::cache_path_for;
use crate::source::DecodedAudioSource;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as audio
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Outcome of a precomputation pass
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Caches written
    pub cached: Vec<PathBuf>,
    /// Files that already had a cache
    pub skipped: usize,
    /// Files that could not be processed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Audio files under `root` that do not yet have a cache
pub fn find_uncached(root: &Path) -> (Vec<PathBuf>, usize) {
    let mut pending = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if !is_audio_file(path) {
            continue;
        }
        if cache_path_for(path).exists() {
            skipped += 1;
        } else {
            pending.push(path.to_path_buf());
        }
    }

    pending.sort();
    (pending, skipped)
}

fn is_audio_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    let audio = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    audio && !hidden
}

/// Compute and store caches for every uncached audio file under `root`
pub fn precompute_directory(root: &Path, config: &EngineConfig) -> Result<BatchReport> {
    config.validate()?;
    let (pending, skipped) = find_uncached(root);
    log::info!(
        "Precomputing {} file(s) under {:?} ({} already cached)",
        pending.len(),
        root,
        skipped
    );

    let results: Vec<(PathBuf, Result<PathBuf>)> = pending
        .par_iter()
        .map(|path| (path.clone(), precompute_file(path, config)))
        .collect();

    let mut report = BatchReport {
        skipped,
        ..BatchReport::default()
    };
    for (path, result) in results {
        match result {
            Ok(cache) => report.cached.push(cache),
            Err(e) => {
                log::warn!("Precompute failed for {:?}: {:#}", path, e);
                report.failed.push((path, format!("{:#}", e)));
            }
        }
    }

    log::info!(
        "Precompute done: {} cached, {} skipped, {} failed",
        report.cached.len(),
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}

fn precompute_file(path: &Path, config: &EngineConfig) -> Result<PathBuf> {
    let mut config = config.clone();
    config.realtime = false;

    let mut source = DecodedAudioSource::open(path, config.block_frames)?;
    let mut engine = SyncEngine::new(config, NullActuator)?;
    let summary = engine
        .run(path, &mut source)
        .with_context(|| format!("Failed to analyze {:?}", path))?;

    match (summary.cache_written, summary.store_error) {
        (Some(cache), _) => Ok(cache),
        (None, Some(e)) => {
            Err(anyhow::Error::new(e).context(format!("No cache written for {:?}", path)))
        }
        (None, None) => anyhow::bail!("No cache written for {:?}: no audio decoded", path),
    }
}
