//! ベースライン追跡器

use super::state::BaselineState;
use crate::kpi::SeriesKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// 系列ごとの排他ハンドル
///
/// 保持している間、同一キーの更新・検知は直列化される。
pub type SeriesHandle = Arc<Mutex<BaselineState>>;

/// (cell_id, kpi_name) ごとのベースラインを保持する追跡器
///
/// 状態はエンジンインスタンスが所有する。初回サンプルで遅延生成され、
/// 明示的な `reset` 以外では破棄されない。
pub struct BaselineTracker {
    short_capacity: usize,
    long_capacity: usize,
    series: RwLock<HashMap<SeriesKey, SeriesHandle>>,
}

impl BaselineTracker {
    /// 新しい追跡器を作成
    pub fn new(short_capacity: usize, long_capacity: usize) -> Self {
        Self {
            short_capacity,
            long_capacity,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// キーのハンドルを取得（なければ作成）
    pub async fn handle(&self, key: &SeriesKey) -> SeriesHandle {
        if let Some(handle) = self.series.read().await.get(key) {
            return handle.clone();
        }

        let mut series = self.series.write().await;
        series
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("Creating baseline for {}", key);
                Arc::new(Mutex::new(BaselineState::new(
                    self.short_capacity,
                    self.long_capacity,
                )))
            })
            .clone()
    }

    /// キーの状態を排他ロックする
    ///
    /// ロック待ちの間に `reset` で外されたハンドルは使わず、取り直す。
    pub async fn lock(&self, key: &SeriesKey) -> OwnedMutexGuard<BaselineState> {
        loop {
            let handle = self.handle(key).await;
            let guard = Arc::clone(&handle).lock_owned().await;
            let current = self
                .series
                .read()
                .await
                .get(key)
                .is_some_and(|h| Arc::ptr_eq(h, &handle));
            if current {
                return guard;
            }
        }
    }

    /// 値を取り込み、更新後のスナップショットを返す
    pub async fn update(&self, cell_id: &str, kpi_name: &str, value: f64) -> BaselineState {
        let mut state = self.lock(&SeriesKey::new(cell_id, kpi_name)).await;
        state.observe(value);
        state.clone()
    }

    /// 現在の状態を取得
    pub async fn snapshot(&self, key: &SeriesKey) -> Option<BaselineState> {
        let handle = self.series.read().await.get(key).cloned()?;
        let state = handle.lock().await;
        Some(state.clone())
    }

    /// 系列をリセット（オペレーター操作）
    ///
    /// 処理中の更新が終わるまで待ってから外す。
    pub async fn reset(&self, key: &SeriesKey) -> bool {
        let Some(handle) = self.series.read().await.get(key).cloned() else {
            return false;
        };
        let _state = handle.lock().await;

        let mut series = self.series.write().await;
        match series.get(key) {
            Some(current) if Arc::ptr_eq(current, &handle) => {
                series.remove(key);
                true
            }
            _ => false,
        }
    }

    /// 追跡中の系列数
    pub async fn len(&self) -> usize {
        self.series.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.series.read().await.is_empty()
    }

    /// 追跡中のキー一覧
    pub async fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.series.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::statistics::Statistics;

    #[tokio::test]
    async fn test_count_mean_variance_match_reference() {
        let tracker = BaselineTracker::new(20, 200);
        let values: Vec<f64> = (0..500)
            .map(|i| 50.0 + ((i * 37) % 23) as f64 * 1.7 - (i % 5) as f64)
            .collect();

        let mut state = None;
        for &v in &values {
            state = Some(tracker.update("cell-1", "latency_ms", v).await);
        }
        let state = state.unwrap();

        assert_eq!(state.count, values.len() as u64);
        assert!((state.mean - values.iter().mean()).abs() < 1e-9);
        assert!((state.variance - values.iter().variance()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_windows_respect_capacity() {
        let tracker = BaselineTracker::new(3, 5);
        let mut last = None;
        for i in 0..12 {
            last = Some(tracker.update("cell-1", "throughput_mbps", i as f64).await);
        }
        let state = last.unwrap();
        assert_eq!(state.short_window.to_vec(), vec![9.0, 10.0, 11.0]);
        assert_eq!(state.long_window.to_vec(), vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let tracker = BaselineTracker::new(3, 5);
        tracker.update("cell-1", "latency_ms", 10.0).await;
        tracker.update("cell-2", "latency_ms", 90.0).await;
        tracker.update("cell-1", "throughput_mbps", 500.0).await;

        assert_eq!(tracker.len().await, 3);
        let s = tracker
            .snapshot(&SeriesKey::new("cell-1", "latency_ms"))
            .await
            .unwrap();
        assert_eq!(s.mean, 10.0);
    }

    #[tokio::test]
    async fn test_replay_on_fresh_tracker_is_identical() {
        let values = [3.0, 9.5, 4.25, 8.0, 1.0, 7.75];

        let a = BaselineTracker::new(4, 8);
        let b = BaselineTracker::new(4, 8);
        let mut sa = None;
        let mut sb = None;
        for &v in &values {
            sa = Some(a.update("cell", "kpi", v).await);
        }
        for &v in &values {
            sb = Some(b.update("cell", "kpi", v).await);
        }

        assert_eq!(sa, sb);
    }

    #[tokio::test]
    async fn test_reset_removes_series() {
        let tracker = BaselineTracker::new(3, 5);
        tracker.update("cell-1", "latency_ms", 10.0).await;
        let key = SeriesKey::new("cell-1", "latency_ms");

        assert!(tracker.reset(&key).await);
        assert!(tracker.snapshot(&key).await.is_none());
        assert!(tracker.is_empty().await);
        assert!(!tracker.reset(&key).await);
    }

    #[tokio::test]
    async fn test_reset_waits_for_in_flight_update() {
        let tracker = Arc::new(BaselineTracker::new(3, 5));
        let key = SeriesKey::new("cell-1", "latency_ms");
        tracker.update("cell-1", "latency_ms", 10.0).await;

        let mut state = tracker.lock(&key).await;

        let reset = {
            let tracker = Arc::clone(&tracker);
            let key = key.clone();
            tokio::spawn(async move { tracker.reset(&key).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!reset.is_finished());

        // リセット待ちの後ろに並んだ更新
        let update = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.update("cell-1", "latency_ms", 30.0).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        state.observe(20.0);
        drop(state);

        assert!(reset.await.unwrap());
        let after = update.await.unwrap();

        // 更新は外されたハンドルではなく新しい系列に入る
        assert_eq!(after.count, 1);
        assert_eq!(after.mean, 30.0);
        let current = tracker.snapshot(&key).await.unwrap();
        assert_eq!(current, after);
    }
}
