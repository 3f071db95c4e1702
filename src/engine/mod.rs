//! Engine orchestration: configuration, the run state machine, output
//! actuators and offline cache precomputation.

pub mod actuator;
pub mod batch;
pub mod config;
pub mod pipeline;

pub use actuator::{
    ChannelActuator, ConsoleActuator, NullActuator, RecordingActuator, DEFAULT_PINS,
};
pub use batch::{precompute_directory, BatchReport};
pub use config::{
    verbosity_filter, AnalysisConfig, EmptyBandPolicy, EngineConfig, ExhaustedCachePolicy,
    ThresholdConfig, DETAIL_LOG_LEVEL,
};
pub use pipeline::{CancelToken, RunOutcome, RunSummary, SyncEngine, SyncMode};
