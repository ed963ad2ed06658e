//! エンジン統計

use crate::alerts::DispatchStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    processed: AtomicU64,
    anomalous: AtomicU64,
    rejected: AtomicU64,
    retrains_scheduled: AtomicU64,
}

impl EngineCounters {
    pub(crate) fn record_processed(&self, anomalous: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if anomalous {
            self.anomalous.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retrain(&self) {
        self.retrains_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.processed.load(Ordering::Relaxed),
            self.anomalous.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
            self.retrains_scheduled.load(Ordering::Relaxed),
        )
    }
}

/// エンジン統計のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// 検知まで完了したサンプル数
    pub processed: u64,
    /// 異常と判定されたサンプル数
    pub anomalous: u64,
    /// 検証で拒否されたサンプル数
    pub rejected: u64,
    pub retrains_scheduled: u64,
    /// 追跡中の (cell, kpi) 系列数
    pub tracked_series: usize,
    /// 学習済みモデルを持つセル数
    pub trained_cells: usize,
    pub alerts: DispatchStats,
}

impl EngineStats {
    /// 異常率
    pub fn anomaly_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.anomalous as f64 / self.processed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = EngineCounters::default();
        counters.record_processed(false);
        counters.record_processed(true);
        counters.record_rejected();
        assert_eq!(counters.snapshot(), (2, 1, 1, 0));
    }

    #[test]
    fn test_anomaly_rate() {
        assert_eq!(EngineStats::default().anomaly_rate(), 0.0);
        let stats = EngineStats {
            processed: 8,
            anomalous: 2,
            ..EngineStats::default()
        };
        assert_eq!(stats.anomaly_rate(), 0.25);
    }
}
