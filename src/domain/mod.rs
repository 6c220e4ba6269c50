//! Robot configuration entities

pub mod curve;
pub mod general;
pub mod period;
pub mod strategy;

pub use curve::{CurveKey, CurveModel, CurvePoint, CurveSample, CurveSnapshot};
pub use general::{GeneralSettings, LOG_LEVELS};
pub use period::TradingPeriod;
pub use strategy::{StrategySettings, MAX_RATE};
