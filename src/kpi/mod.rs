//! KPI Sample Model
//!
//! エンジンが扱うデータの基本単位

mod record;
mod sample;
mod summary;

pub use record::{KpiBatch, NetworkKpiRecord};
pub use sample::{names, plausible_range, KpiSample, SeriesKey, TrafficProfile};
pub use summary::{summarize, KpiSummary, SeriesSummary};
