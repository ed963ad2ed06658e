//! # cellpulse
//!
//! Multi-algorithm anomaly detection engine for 5G cell KPI streams.
//!
//! Samples flow through a per-(cell, KPI) rolling baseline, a configurable set of
//! detectors (Z-score, rolling-baseline deviation, Isolation Forest, profile-aware
//! throughput drop, traffic instability), and an aggregator that ranks the candidates
//! into one event per sample. Anomalous events are turned into alerts and persisted
//! asynchronously.
//!
//! ```no_run
//! use cellpulse::{AnomalyEngine, EngineConfig, KpiSample, TrafficProfile};
//!
//! # async fn run() -> cellpulse::Result<()> {
//! let engine = AnomalyEngine::new(EngineConfig::default())?;
//! let sample = KpiSample::new(
//!     "gNB_001_Cell_1",
//!     TrafficProfile::Embb,
//!     chrono::Utc::now(),
//!     "latency_ms",
//!     18.4,
//! );
//! let event = engine.process(sample).await?;
//! println!("anomalous: {}", event.is_anomalous);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod alerts;
pub mod baseline;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod forest;
pub mod generator;
pub mod kpi;
pub mod logging;

pub use aggregator::{Aggregator, AnomalyEvent};
pub use alerts::{AlertLevel, AlertRecord, AlertSink, AlertStore, InMemoryAlertStore};
pub use config::{ConfigLoader, EngineConfig};
pub use detectors::{AnomalyCandidate, AnomalyKind};
pub use engine::{AnomalyEngine, EngineStats};
pub use error::{Error, Result};
pub use kpi::{KpiSample, NetworkKpiRecord, TrafficProfile};
