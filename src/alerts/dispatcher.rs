//! 非同期アラート配送
//!
//! 有界チャネル経由でバックグラウンドタスクがシンクへ書き込む。
//! チャネルが満杯の場合は破棄して警告を出し、検知処理は待たせない。

use super::record::AlertRecord;
use super::store::AlertSink;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// アラート配送器
pub struct AlertDispatcher {
    sender: Mutex<Option<mpsc::Sender<AlertRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<DispatchCounters>,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    stored: AtomicU64,
    failed: AtomicU64,
}

/// 配送統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub stored: u64,
    pub failed: u64,
}

impl AlertDispatcher {
    /// 配送タスクを起動（Tokio ランタイム内で呼ぶこと）
    pub fn spawn(sink: Arc<dyn AlertSink>, capacity: usize) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("Alert dispatcher requires a Tokio runtime: {}", e)))?;

        let (tx, mut rx) = mpsc::channel::<AlertRecord>(capacity.max(1));
        let counters = Arc::new(DispatchCounters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = runtime.spawn(async move {
            while let Some(alert) = rx.recv().await {
                let id = alert.id;
                match sink.store(alert).await {
                    Ok(()) => {
                        worker_counters.stored.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Failed to store alert {}: {}", id, e);
                    }
                }
            }
            debug!("Alert dispatcher drained");
        });

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            counters,
        })
    }

    /// アラートを投入（ブロックしない）
    ///
    /// 受け付けた場合は true。
    pub fn dispatch(&self, alert: AlertRecord) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = sender.as_ref() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Alert dispatcher closed, dropping alert {}", alert.id);
            return false;
        };

        match tx.try_send(alert) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(alert)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Alert queue full, dropping alert {} for {}/{}",
                    alert.id, alert.cell_id, alert.kpi_name
                );
                false
            }
            Err(TrySendError::Closed(alert)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Alert worker stopped, dropping alert {}", alert.id);
                false
            }
        }
    }

    /// 受付を停止し、キュー内のアラートを書き切るまで待つ
    pub async fn close(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Alert worker terminated abnormally: {}", e);
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertLevel, AlertStore, InMemoryAlertStore};
    use crate::detectors::AnomalyKind;
    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Notify;
    use uuid::Uuid;

    fn alert() -> AlertRecord {
        AlertRecord {
            id: Uuid::new_v4(),
            cell_id: "cell-1".to_string(),
            kpi_name: "latency_ms".to_string(),
            timestamp: Utc::now(),
            aggregate_severity: 0.9,
            level: AlertLevel::Critical,
            kinds: vec![AnomalyKind::Zscore],
            value: 120.0,
            message: "latency spike".to_string(),
            acknowledged: false,
        }
    }

    /// 解放されるまで書き込みを止めるシンク
    struct GatedSink {
        gate: Notify,
    }

    #[async_trait]
    impl AlertSink for GatedSink {
        async fn store(&self, _alert: AlertRecord) -> Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn store(&self, _alert: AlertRecord) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_close_flushes_queue() {
        let store = Arc::new(InMemoryAlertStore::new());
        let dispatcher = AlertDispatcher::spawn(store.clone(), 16).unwrap();
        for _ in 0..10 {
            assert!(dispatcher.dispatch(alert()));
        }
        dispatcher.close().await;

        assert_eq!(store.counts().await.unwrap().total, 10);
        assert_eq!(dispatcher.stats().stored, 10);
        assert!(!dispatcher.dispatch(alert()));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let sink = Arc::new(GatedSink { gate: Notify::new() });
        let dispatcher = AlertDispatcher::spawn(sink.clone(), 2).unwrap();

        let accepted = (0..10).filter(|_| dispatcher.dispatch(alert())).count();
        // ワーカーが1件取り出している可能性がある
        assert!((2..=3).contains(&accepted));
        assert_eq!(dispatcher.stats().dropped, 10 - accepted as u64);
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted() {
        let dispatcher = AlertDispatcher::spawn(Arc::new(FailingSink), 4).unwrap();
        dispatcher.dispatch(alert());
        dispatcher.close().await;
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let store = Arc::new(InMemoryAlertStore::new());
        assert!(AlertDispatcher::spawn(store, 4).is_err());
    }
}
