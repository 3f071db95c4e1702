use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use synchronized_lights::engine::{
    precompute_directory, verbosity_filter, ConsoleActuator, ExhaustedCachePolicy, RunOutcome,
    SyncMode, DEFAULT_PINS,
};
use synchronized_lights::source::{
    DecodedAudioSource, FileSelector, PlaylistSelector, SourceSelector,
};
use synchronized_lights::{EngineConfig, SyncEngine};

#[derive(Parser, Debug)]
#[command(name = "synchronized-lights")]
#[command(about = "Switch light channels in time with an audio file", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "playlist", "precompute"])))]
struct Args {
    /// Audio file to synchronize to
    #[arg(long)]
    file: Option<String>,

    /// Voting playlist to choose the song from
    #[arg(long)]
    playlist: Option<String>,

    /// Compute missing sync caches for every audio file under a directory
    #[arg(long)]
    precompute: Option<String>,

    /// Output verbosity: 0 = warnings, 1 = progress, 2 = per-block detail
    #[arg(
        short = 'v',
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    verbosity: u8,

    /// JSON file overriding engine constants
    #[arg(long)]
    config: Option<String>,

    /// Frames per analysis block (overrides the config file)
    #[arg(long)]
    block_frames: Option<usize>,

    /// What replay emits once the cache runs out
    #[arg(long, value_enum)]
    on_exhausted: Option<ExhaustedCachePolicy>,

    /// Pace output to wall-clock block boundaries
    #[arg(long)]
    realtime: bool,

    /// Physical pins for each channel, comma-separated
    #[arg(long, value_delimiter = ',')]
    pins: Option<Vec<u8>>,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = verbosity_filter(args.verbosity).as_str();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Build engine configuration
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(&expand(path))?,
        None => EngineConfig::default(),
    };
    if let Some(frames) = args.block_frames {
        config = config.with_block_frames(frames);
    }
    if let Some(policy) = args.on_exhausted {
        config = config.with_exhausted_policy(policy);
    }
    config = config.with_realtime(args.realtime);
    config.validate()?;

    if let Some(dir) = &args.precompute {
        let report = precompute_directory(&expand(dir), &config)?;
        for (path, reason) in &report.failed {
            log::error!("{:?}: {}", path, reason);
        }
        log::info!("{} cache(s) written", report.cached.len());
        return Ok(());
    }

    // Determine the file to play
    let selector: Box<dyn SourceSelector> = match (&args.file, &args.playlist) {
        (Some(file), _) => Box::new(FileSelector::new(expand(file))),
        (None, Some(playlist)) => Box::new(PlaylistSelector::new(expand(playlist))),
        (None, None) => anyhow::bail!("One of --playlist or --file must be specified"),
    };
    let song = selector.select()?;
    let song = song
        .canonicalize()
        .with_context(|| format!("Audio file not found: {:?}", song))?;

    let pins = args.pins.unwrap_or_else(|| DEFAULT_PINS.to_vec());
    if pins.len() != config.channel_count() {
        anyhow::bail!(
            "{} pins given for {} channels",
            pins.len(),
            config.channel_count()
        );
    }

    let mut source = DecodedAudioSource::open(&song, config.block_frames)?;
    let actuator = ConsoleActuator::new(std::io::stdout().lock(), pins);
    let mut engine = SyncEngine::new(config, actuator)?;
    let summary = engine.run(&song, &mut source)?;

    if summary.mode == SyncMode::Replay && summary.uncached_blocks > 0 {
        log::warn!(
            "{} block(s) played past the end of the cache",
            summary.uncached_blocks
        );
    }
    if let Some(e) = &summary.load_error {
        log::warn!("Sync cache was unusable: {}", e);
    }
    if let Some(e) = &summary.store_error {
        log::warn!("Sync cache was not saved: {}", e);
    }
    if summary.outcome == RunOutcome::Cancelled {
        log::warn!("Playback was cancelled");
    }

    Ok(())
}
