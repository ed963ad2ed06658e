//! Engine configuration

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AggregatorConfig, AlertsConfig, BaselineConfig, BaselineDeviationConfig, DetectorsConfig,
    EngineConfig, IsolationForestConfig, LoggingConfig, ProfileFloors, RuntimeConfig,
    ThroughputDropConfig, TrafficInstabilityConfig, ZScoreConfig,
};
