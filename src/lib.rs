pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod robot;
pub mod staging;

pub use config::AppConfig;
pub use domain::{
    CurveModel, CurvePoint, CurveSample, CurveSnapshot, GeneralSettings, StrategySettings,
    TradingPeriod,
};
pub use error::{Result, StagingError};
pub use persistence::{
    ConfigStore, FlushReport, JsonFileStore, MemoryStore, PersistenceScheduler, SchedulerConfig,
};
pub use robot::{ConfigTarget, RobotConfig};
pub use staging::{
    ApplyOutcome, ChangeSet, ConfigCollection, ConfigEntity, ConfigPair, GateVote, PairState,
    ValidationGate,
};
