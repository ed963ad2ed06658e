//! Baseline Tracker
//!
//! (cell_id, kpi_name) ごとのローリング統計（Welford 平均・分散、短期・長期ウィンドウ）

mod state;
mod tracker;
mod window;

pub use state::{BaselineState, PriorBaseline};
pub use tracker::{BaselineTracker, SeriesHandle};
pub use window::RingWindow;
