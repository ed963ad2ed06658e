//! 系列ごとのベースライン状態

use super::window::RingWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// (cell_id, kpi_name) ごとのローリング統計
///
/// 不変条件: `count >= short_window.len()`、ウィンドウは FIFO。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    /// 取り込んだサンプル数
    pub count: u64,
    /// 平均値（Welford）
    pub mean: f64,
    /// 不偏分散（Welford、count < 2 のとき 0）
    pub variance: f64,
    /// 偏差平方和
    m2: f64,
    /// 短期ウィンドウ（変化に速く反応）
    pub short_window: RingWindow,
    /// 長期ウィンドウ（安定した参照）
    pub long_window: RingWindow,
    /// 最後に取り込んだサンプルの時刻
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl BaselineState {
    /// 空の状態を作成
    pub fn new(short_capacity: usize, long_capacity: usize) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            variance: 0.0,
            m2: 0.0,
            short_window: RingWindow::new(short_capacity),
            long_window: RingWindow::new(long_capacity),
            last_timestamp: None,
        }
    }

    /// 統計値を直接指定して状態を作成（検知器の単体評価用）
    #[cfg(test)]
    pub(crate) fn from_moments(count: u64, mean: f64, variance: f64) -> Self {
        let mut state = Self::new(20, 200);
        state.count = count;
        state.mean = mean;
        state.variance = variance.max(0.0);
        state.m2 = if count > 1 {
            state.variance * (count - 1) as f64
        } else {
            0.0
        };
        state
    }

    /// 値を1件取り込む（O(1)）
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean = value;
            self.m2 = 0.0;
            self.variance = 0.0;
        } else {
            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            // 丸め誤差で負にならないようにする
            self.m2 = (self.m2 + delta * delta2).max(0.0);
            self.variance = self.m2 / (self.count - 1) as f64;
        }

        self.short_window.push(value);
        self.long_window.push(value);
    }

    /// 標準偏差
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn short_mean(&self) -> Option<f64> {
        self.short_window.mean()
    }

    pub fn long_mean(&self) -> Option<f64> {
        self.long_window.mean()
    }

    /// 取り込み前の比較に必要な部分だけを写し取る
    pub fn prior(&self) -> PriorBaseline {
        PriorBaseline {
            count: self.count,
            long_len: self.long_window.len(),
            long_mean: self.long_window.mean(),
            short_window: self.short_window.clone(),
        }
    }
}

/// サンプル取り込み前のベースライン要約
///
/// 長期ウィンドウ本体は持たず、件数と平均だけを保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct PriorBaseline {
    pub count: u64,
    /// 長期ウィンドウの件数
    pub long_len: usize,
    /// 長期ウィンドウの平均
    pub long_mean: Option<f64>,
    pub short_window: RingWindow,
}
