//! Synchronization run orchestration
//!
//! A run picks its mode once, from the cache: a usable record means
//! replay, anything else (missing, corrupt, unreadable) means fresh
//! computation. Fresh runs store their record when the stream ends.

use super::actuator::ChannelActuator;
use super::config::{EngineConfig, ExhaustedCachePolicy};
use crate::analysis::{BandAnalyzer, FrequencyBandAnalyzer, ThresholdController};
use crate::cache::LightSequenceCache;
use crate::error::{CacheError, SyncResult};
use crate::model::{AudioBlock, ChannelVector, SyncRecord};
use crate::source::BlockSource;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Operating mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Decisions computed from the signal and recorded
    Fresh,
    /// Decisions read back from the cache
    Replay,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Shared flag for stopping a run between blocks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened during a run
#[derive(Debug)]
pub struct RunSummary {
    pub mode: SyncMode,
    pub outcome: RunOutcome,
    /// Blocks emitted
    pub blocks: usize,
    /// Replay blocks that had no cached row
    pub uncached_blocks: usize,
    /// Fresh blocks whose analysis took longer than the block lasts
    pub deadline_misses: usize,
    /// Where the new cache was written
    pub cache_written: Option<PathBuf>,
    /// Cache problem that forced fresh mode
    pub load_error: Option<CacheError>,
    /// Failure to persist the fresh record
    pub store_error: Option<CacheError>,
}

impl RunSummary {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            outcome: RunOutcome::Completed,
            blocks: 0,
            uncached_blocks: 0,
            deadline_misses: 0,
            cache_written: None,
            load_error: None,
            store_error: None,
        }
    }
}

/// Sleeps so block `i` is emitted `i` block-durations after the run began
struct Pacer {
    start: Instant,
    block_duration: Duration,
}

impl Pacer {
    fn wait_for(&self, block: usize) {
        let due = self.start + self.block_duration.mul_f64(block as f64);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

/// Analyzer and controller built on first need
struct FreshStage<B> {
    analyzer: B,
    controller: ThresholdController,
}

impl<B: BandAnalyzer> FreshStage<B> {
    fn process(&mut self, block: &AudioBlock) -> SyncResult<ChannelVector> {
        let bands = self.analyzer.analyze(block)?;
        self.controller.classify(&bands)
    }
}

/// Drives lights from an audio block stream, caching fresh decisions
pub struct SyncEngine<A: ChannelActuator> {
    config: EngineConfig,
    cache: LightSequenceCache,
    actuator: A,
    cancel: CancelToken,
}

impl<A: ChannelActuator> SyncEngine<A> {
    /// Create an engine; fails if the configuration is inconsistent
    pub fn new(config: EngineConfig, actuator: A) -> SyncResult<Self> {
        config.validate()?;
        let cache = LightSequenceCache::new(config.channel_count());

        Ok(Self {
            config,
            cache,
            actuator,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn into_actuator(self) -> A {
        self.actuator
    }

    /// Run one playback of `source` using the FFT band analyzer
    ///
    /// `source` identifies the cache; `blocks` supplies the audio.
    pub fn run<S: BlockSource>(&mut self, source: &Path, blocks: &mut S) -> Result<RunSummary> {
        let config = self.config.clone();
        let (rate, channels) = (blocks.sample_rate(), blocks.audio_channels());
        self.run_inner(source, blocks, move || {
            FrequencyBandAnalyzer::new(&config, rate, channels)
        })
    }

    /// Run one playback with a caller-supplied analyzer
    pub fn run_with_analyzer<S: BlockSource, B: BandAnalyzer>(
        &mut self,
        source: &Path,
        blocks: &mut S,
        analyzer: B,
    ) -> Result<RunSummary> {
        self.run_inner(source, blocks, move || Ok(analyzer))
    }

    fn run_inner<S, B, F>(
        &mut self,
        source: &Path,
        blocks: &mut S,
        make_analyzer: F,
    ) -> Result<RunSummary>
    where
        S: BlockSource,
        B: BandAnalyzer,
        F: FnOnce() -> SyncResult<B>,
    {
        let channel_count = self.config.channel_count();

        match blocks.duration_secs() {
            Some(secs) => log::info!("Playing: {:?} ({:.0} sec)", source, secs),
            None => log::info!("Playing: {:?}", source),
        }

        let (cached, load_error) = match self.cache.load(source) {
            Ok(record) => (record, None),
            Err(e) => {
                log::warn!("Ignoring unusable sync cache: {}", e);
                (None, Some(e))
            }
        };

        self.actuator.all_off(channel_count)?;

        let result = match cached {
            Some(record) => self.replay(record, blocks, make_analyzer),
            None => self.fresh(source, blocks, make_analyzer),
        };

        if let Err(e) = self.actuator.all_off(channel_count) {
            log::warn!("Failed to switch lights off: {}", e);
        }

        let mut summary = result?;
        summary.load_error = load_error;

        if summary.deadline_misses > 0 {
            log::warn!(
                "{} of {} blocks took longer to analyze than they last",
                summary.deadline_misses,
                summary.blocks
            );
        }
        log::info!(
            "Run finished: {:?} mode, {:?}, {} blocks",
            summary.mode,
            summary.outcome,
            summary.blocks
        );
        Ok(summary)
    }

    fn block_duration(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.config.block_frames as f64 / f64::from(sample_rate))
    }

    fn pacer(&self, sample_rate: u32) -> Option<Pacer> {
        self.config.realtime.then(|| Pacer {
            start: Instant::now(),
            block_duration: self.block_duration(sample_rate),
        })
    }

    /// Fetch the next block unless the run was cancelled
    fn next_block<S: BlockSource>(
        &self,
        blocks: &mut S,
        summary: &mut RunSummary,
    ) -> Result<Option<AudioBlock>> {
        if self.cancel.is_cancelled() {
            log::warn!("Run cancelled after {} blocks", summary.blocks);
            summary.outcome = RunOutcome::Cancelled;
            return Ok(None);
        }
        blocks.next_block()
    }

    fn fresh<S, B, F>(
        &mut self,
        source: &Path,
        blocks: &mut S,
        make_analyzer: F,
    ) -> Result<RunSummary>
    where
        S: BlockSource,
        B: BandAnalyzer,
        F: FnOnce() -> SyncResult<B>,
    {
        let mut summary = RunSummary::new(SyncMode::Fresh);
        let mut stage = FreshStage {
            analyzer: make_analyzer()?,
            controller: ThresholdController::new(
                self.config.threshold.clone(),
                self.config.channel_count(),
            ),
        };
        let budget = self.block_duration(blocks.sample_rate());
        let pacer = self.pacer(blocks.sample_rate());
        let mut record = SyncRecord::new();

        while let Some(block) = self.next_block(blocks, &mut summary)? {
            let started = Instant::now();
            let vector = stage.process(&block)?;
            let elapsed = started.elapsed();
            if elapsed > budget {
                summary.deadline_misses += 1;
                log::debug!(
                    "Block {} took {:?}, budget {:?}",
                    summary.blocks,
                    elapsed,
                    budget
                );
            }

            if let Some(p) = &pacer {
                p.wait_for(summary.blocks);
            }
            self.actuator.apply(&vector)?;
            record.push(vector);
            summary.blocks += 1;
        }

        if summary.outcome == RunOutcome::Cancelled {
            log::info!("Not caching a partial run");
            return Ok(summary);
        }
        if record.is_empty() {
            log::warn!("No audio blocks in {:?}; nothing to cache", source);
            return Ok(summary);
        }

        match self.cache.store(source, &record) {
            Ok(path) => summary.cache_written = Some(path),
            Err(e) => {
                log::warn!("Sync cache not saved, next run will recompute: {}", e);
                summary.store_error = Some(e);
            }
        }
        Ok(summary)
    }

    fn replay<S, B, F>(
        &mut self,
        record: SyncRecord,
        blocks: &mut S,
        make_analyzer: F,
    ) -> Result<RunSummary>
    where
        S: BlockSource,
        B: BandAnalyzer,
        F: FnOnce() -> SyncResult<B>,
    {
        let mut summary = RunSummary::new(SyncMode::Replay);
        let channel_count = self.config.channel_count();
        let policy = self.config.exhausted_policy;
        let pacer = self.pacer(blocks.sample_rate());
        let mut make_analyzer = Some(make_analyzer);
        let mut fallback: Option<FreshStage<B>> = None;

        log::info!("Replaying {} cached rows", record.len());

        while let Some(block) = self.next_block(blocks, &mut summary)? {
            let row = summary.blocks;

            let vector = match record.get(row) {
                Some(v) => v.clone(),
                None => {
                    if summary.uncached_blocks == 0 {
                        log::warn!(
                            "Ran out of cached timing values at block {}; continuing with {:?}",
                            row,
                            policy
                        );
                    }
                    summary.uncached_blocks += 1;

                    match policy {
                        ExhaustedCachePolicy::FreezeLast => record
                            .rows()
                            .last()
                            .cloned()
                            .unwrap_or_else(|| ChannelVector::all_off(channel_count)),
                        ExhaustedCachePolicy::AllOff => ChannelVector::all_off(channel_count),
                        ExhaustedCachePolicy::Recompute => {
                            if fallback.is_none() {
                                if let Some(make) = make_analyzer.take() {
                                    fallback = Some(FreshStage {
                                        analyzer: make()?,
                                        controller: ThresholdController::new(
                                            self.config.threshold.clone(),
                                            channel_count,
                                        ),
                                    });
                                }
                            }
                            match fallback.as_mut() {
                                Some(stage) => stage.process(&block)?,
                                None => ChannelVector::all_off(channel_count),
                            }
                        }
                    }
                }
            };

            if let Some(p) = &pacer {
                p.wait_for(row);
            }
            self.actuator.apply(&vector)?;
            summary.blocks += 1;
        }

        if summary.uncached_blocks > 0 {
            log::warn!(
                "Cache covered {} of {} blocks",
                record.len(),
                summary.blocks
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actuator::RecordingActuator;
    use crate::source::MemorySource;
    use tempfile::TempDir;

    fn recording_engine() -> SyncEngine<RecordingActuator> {
        SyncEngine::new(EngineConfig::default(), RecordingActuator::new()).unwrap()
    }

    fn tone_blocks(count: usize, sample_rate: u32, block_frames: usize) -> MemorySource {
        let samples: Vec<i16> = (0..count * block_frames)
            .map(|n| {
                let t = n as f64 / f64::from(sample_rate);
                let amp = if (n / block_frames) % 3 == 0 { 12000.0 } else { 800.0 };
                (amp * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as i16
            })
            .collect();
        MemorySource::from_samples(&samples, sample_rate, 1, block_frames)
    }

    #[test]
    fn test_fresh_run_writes_cache() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let mut engine = recording_engine();

        let summary = engine.run(&song, &mut tone_blocks(6, 44100, 4096)).unwrap();
        assert_eq!(summary.mode, SyncMode::Fresh);
        assert_eq!(summary.blocks, 6);
        assert_eq!(
            summary.cache_written,
            Some(dir.path().join(".song.wav.sync.gz"))
        );
        assert_eq!(engine.actuator().emitted().len(), 6);
        // Lights off before and after
        assert_eq!(engine.actuator().resets(), 2);
    }

    #[test]
    fn test_cancelled_run_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let token = CancelToken::new();
        token.cancel();

        let mut engine = SyncEngine::new(EngineConfig::default(), RecordingActuator::new())
            .unwrap()
            .with_cancel_token(token);
        let summary = engine.run(&song, &mut tone_blocks(3, 44100, 4096)).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.blocks, 0);
        assert!(summary.cache_written.is_none());
        assert!(!dir.path().join(".song.wav.sync.gz").exists());
    }

    /// Yields blocks from `inner` and cancels `token` once `after` blocks are out
    struct CancellingSource {
        inner: MemorySource,
        token: CancelToken,
        after: usize,
        served: usize,
    }

    impl BlockSource for CancellingSource {
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn audio_channels(&self) -> u16 {
            self.inner.audio_channels()
        }

        fn next_block(&mut self) -> Result<Option<AudioBlock>> {
            let block = self.inner.next_block()?;
            self.served += 1;
            if self.served == self.after {
                self.token.cancel();
            }
            Ok(block)
        }
    }

    /// Yields `good` blocks, then fails the way a broken read would
    struct FailingSource {
        inner: MemorySource,
        good: usize,
    }

    impl BlockSource for FailingSource {
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn audio_channels(&self) -> u16 {
            self.inner.audio_channels()
        }

        fn next_block(&mut self) -> Result<Option<AudioBlock>> {
            if self.good == 0 {
                anyhow::bail!("read error in the middle of the stream");
            }
            self.good -= 1;
            self.inner.next_block()
        }
    }

    /// Reports the same levels for every block, optionally taking its time
    struct FixedAnalyzer {
        level: f64,
        delay: Duration,
    }

    impl BandAnalyzer for FixedAnalyzer {
        fn analyze(&self, _block: &AudioBlock) -> SyncResult<crate::model::BandVector> {
            std::thread::sleep(self.delay);
            Ok(crate::model::BandVector::new(vec![self.level; 8]))
        }

        fn band_count(&self) -> usize {
            8
        }
    }

    fn silent_blocks(count: usize, block_frames: usize) -> MemorySource {
        let blocks = (0..count)
            .map(|_| AudioBlock::new(vec![0; block_frames], 44100, 1))
            .collect();
        MemorySource::new(blocks, 44100, 1)
    }

    #[test]
    fn test_cancel_mid_run_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let token = CancelToken::new();

        let mut engine = SyncEngine::new(EngineConfig::default(), RecordingActuator::new())
            .unwrap()
            .with_cancel_token(token.clone());
        let mut source = CancellingSource {
            inner: tone_blocks(8, 44100, 4096),
            token,
            after: 3,
            served: 0,
        };
        let summary = engine.run(&song, &mut source).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.blocks, 3);
        assert_eq!(engine.actuator().emitted().len(), 3);
        assert!(summary.cache_written.is_none());
        assert!(!dir.path().join(".song.wav.sync.gz").exists());
    }

    #[test]
    fn test_read_error_fails_run_without_cache() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let mut engine = recording_engine();

        let mut source = FailingSource {
            inner: tone_blocks(6, 44100, 4096),
            good: 4,
        };
        assert!(engine.run(&song, &mut source).is_err());

        assert_eq!(engine.actuator().emitted().len(), 4);
        // Lights still go dark after the failure
        assert_eq!(engine.actuator().resets(), 2);
        assert!(!dir.path().join(".song.wav.sync.gz").exists());
    }

    #[test]
    fn test_slow_analysis_counts_deadline_misses() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        // 16 frames at 44.1 kHz leaves well under a millisecond per block
        let config = EngineConfig::default().with_block_frames(16);
        let mut engine = SyncEngine::new(config, RecordingActuator::new()).unwrap();

        let analyzer = FixedAnalyzer {
            level: 50.0,
            delay: Duration::from_millis(3),
        };
        let summary = engine
            .run_with_analyzer(&song, &mut silent_blocks(3, 16), analyzer)
            .unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(summary.deadline_misses, 3);
    }

    #[test]
    fn test_realtime_paces_blocks() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        // 441 frames at 44.1 kHz is 10 ms per block
        let config = EngineConfig::default()
            .with_block_frames(441)
            .with_realtime(true);
        let mut engine = SyncEngine::new(config, RecordingActuator::new()).unwrap();

        let analyzer = FixedAnalyzer {
            level: 50.0,
            delay: Duration::ZERO,
        };
        let started = Instant::now();
        let summary = engine
            .run_with_analyzer(&song, &mut silent_blocks(5, 441), analyzer)
            .unwrap();

        assert_eq!(summary.blocks, 5);
        // The fifth block is due 40 ms after the first
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_load_and_store_errors_both_reported() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        // A directory where the artifact should be: unreadable and not replaceable
        std::fs::create_dir(dir.path().join(".song.wav.sync.gz")).unwrap();

        let mut engine = recording_engine();
        let summary = engine.run(&song, &mut tone_blocks(2, 44100, 4096)).unwrap();

        assert_eq!(summary.mode, SyncMode::Fresh);
        assert!(matches!(summary.load_error, Some(CacheError::Corrupt { .. })));
        assert!(matches!(summary.store_error, Some(CacheError::Store { .. })));
    }

    #[test]
    fn test_empty_stream_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let mut engine = recording_engine();

        let summary = engine
            .run(&song, &mut MemorySource::new(Vec::new(), 44100, 1))
            .unwrap();
        assert_eq!(summary.blocks, 0);
        assert!(summary.cache_written.is_none());
    }

    #[test]
    fn test_degenerate_band_aborts_fresh_run() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        let mut engine = recording_engine();

        let err = engine
            .run(&song, &mut tone_blocks(2, 1000, 4096))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::SyncError>(),
            Some(crate::error::SyncError::DegenerateBand { .. })
        ));
        assert!(!dir.path().join(".song.wav.sync.gz").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_block_frames(0);
        assert!(SyncEngine::new(config, RecordingActuator::new()).is_err());
    }
}
