//! Synthetic KPI Generator
//!
//! プロファイル別の正常時分布と正解ラベル付き異常注入、検知結果の評価。

mod evaluation;
mod inject;
mod profile;
mod stream;

pub use evaluation::{evaluate, EvaluationReport};
pub use inject::InjectedAnomaly;
pub use profile::{Gaussian, ProfileParams};
pub use stream::{CellSpec, KpiGenerator, LabeledRecord, StreamConfig};
