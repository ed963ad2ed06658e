//! Engine Orchestrator
//!
//! サンプル単位のパイプライン:
//! 検証 -> ベースライン更新 -> 検知器 -> 統合 -> アラート配送

mod stats;

pub use stats::EngineStats;

use crate::aggregator::{Aggregator, AnomalyEvent};
use crate::alerts::{AlertDispatcher, AlertRecord, AlertSink};
use crate::baseline::{BaselineState, BaselineTracker};
use crate::config::EngineConfig;
use crate::detectors::{DetectionContext, DetectorSet};
use crate::error::{Result, ValidationError};
use crate::forest::{FeatureStore, ModelInfo, ModelRegistry};
use crate::kpi::{KpiSample, NetworkKpiRecord, SeriesKey};
use stats::EngineCounters;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// サンプル単位の処理結果
pub type SampleResult = std::result::Result<AnomalyEvent, ValidationError>;

/// 異常検知エンジン
///
/// 状態はすべてインスタンスが所有する。クローンは同じ状態を共有する。
#[derive(Clone)]
pub struct AnomalyEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    tracker: BaselineTracker,
    features: FeatureStore,
    registry: Arc<ModelRegistry>,
    detectors: DetectorSet,
    aggregator: Aggregator,
    dispatcher: Option<AlertDispatcher>,
    counters: EngineCounters,
}

impl AnomalyEngine {
    /// アラート配送なしでエンジンを作成
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// アラートシンク付きでエンジンを作成（Tokio ランタイム内で呼ぶこと）
    pub fn with_sink(config: EngineConfig, sink: Arc<dyn AlertSink>) -> Result<Self> {
        Self::build(config, Some(sink))
    }

    fn build(config: EngineConfig, sink: Option<Arc<dyn AlertSink>>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ModelRegistry::new(
            config.detectors.isolation_forest.clone(),
        ));
        let detectors = DetectorSet::from_config(&config.detectors, Arc::clone(&registry));
        let dispatcher = sink
            .map(|sink| AlertDispatcher::spawn(sink, config.alerts.channel_capacity))
            .transpose()?;

        info!(
            "Anomaly engine ready: detectors=[{}], alerts={}",
            detectors.names().join(", "),
            if dispatcher.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                tracker: BaselineTracker::new(
                    config.baseline.short_capacity,
                    config.baseline.long_capacity,
                ),
                features: FeatureStore::new(&config.detectors.isolation_forest),
                aggregator: Aggregator::new(config.aggregator.corroboration_bonus),
                registry,
                detectors,
                dispatcher,
                counters: EngineCounters::default(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// 1サンプルを処理
    pub async fn process(&self, sample: KpiSample) -> SampleResult {
        self.inner.process(sample).await
    }

    /// バッチを処理（結果は入力順）
    ///
    /// セルごとに1タスクで並行処理する。セル内のサンプルは入力順に処理されるため、
    /// 同一キーの順序と、特徴量行の組み立てに必要なKPI間の順序が保たれる。
    pub async fn process_batch(&self, samples: Vec<KpiSample>) -> Vec<SampleResult> {
        let total = samples.len();
        if total == 0 {
            return Vec::new();
        }

        let mut groups: HashMap<String, Vec<(usize, KpiSample)>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (index, sample) in samples.into_iter().enumerate() {
            let key = sample.cell_id.clone();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push((index, sample));
        }

        let permits = Arc::new(Semaphore::new(self.inner.config.engine.effective_parallelism()));
        let mut tasks = JoinSet::new();
        for key in order {
            let Some(group) = groups.remove(&key) else {
                continue;
            };
            let inner = Arc::clone(&self.inner);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let mut results = Vec::with_capacity(group.len());
                for (index, sample) in group {
                    results.push((index, inner.process(sample).await));
                }
                results
            });
        }

        let mut slots: Vec<Option<SampleResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(results) => {
                    for (index, result) in results {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => error!("Batch task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ValidationError::Malformed(
                        "sample was not processed".to_string(),
                    ))
                })
            })
            .collect()
    }

    /// ワイド形式のレコードを処理
    pub async fn process_record(&self, record: &NetworkKpiRecord) -> Vec<SampleResult> {
        self.process_batch(record.into_samples()).await
    }

    /// セルのモデルを即時に再学習し、完了を待つ
    pub async fn retrain_cell(&self, cell_id: &str) -> Result<ModelInfo> {
        let snapshot = self.inner.features.snapshot(cell_id);
        let model = self.inner.registry.retrain(cell_id, snapshot).await?;
        Ok(model.info().clone())
    }

    /// 学習済みモデルの情報
    pub fn model_info(&self, cell_id: &str) -> Option<ModelInfo> {
        self.inner.registry.model(cell_id).map(|m| m.info().clone())
    }

    /// 系列のベースライン
    pub async fn baseline(&self, key: &SeriesKey) -> Option<BaselineState> {
        self.inner.tracker.snapshot(key).await
    }

    /// 系列のベースラインを破棄（オペレーター操作）
    pub async fn reset_series(&self, key: &SeriesKey) -> bool {
        let removed = self.inner.tracker.reset(key).await;
        if removed {
            info!("Baseline reset for {}", key);
        }
        removed
    }

    pub async fn stats(&self) -> EngineStats {
        let (processed, anomalous, rejected, retrains_scheduled) =
            self.inner.counters.snapshot();
        EngineStats {
            processed,
            anomalous,
            rejected,
            retrains_scheduled,
            tracked_series: self.inner.tracker.len().await,
            trained_cells: self.inner.registry.infos().len(),
            alerts: self
                .inner
                .dispatcher
                .as_ref()
                .map(AlertDispatcher::stats)
                .unwrap_or_default(),
        }
    }

    /// 再学習を取り消し、未配送のアラートを書き切る
    pub async fn shutdown(&self) {
        self.inner.registry.shutdown();
        if let Some(dispatcher) = &self.inner.dispatcher {
            dispatcher.close().await;
        }
        info!("Anomaly engine stopped");
    }
}

impl EngineInner {
    async fn process(&self, sample: KpiSample) -> SampleResult {
        if let Err(e) = sample.check() {
            self.counters.record_rejected();
            warn!("Rejected sample for {}/{}: {}", sample.cell_id, sample.kpi_name, e);
            return Err(e);
        }

        let mut state = self.tracker.lock(&sample.key()).await;

        if let Some(last_seen) = state.last_timestamp {
            if sample.timestamp < last_seen {
                self.counters.record_rejected();
                let e = ValidationError::OutOfOrder {
                    cell_id: sample.cell_id.clone(),
                    kpi_name: sample.kpi_name.clone(),
                    timestamp: sample.timestamp,
                    last_seen,
                };
                warn!("Rejected sample: {}", e);
                return Err(e);
            }
        }

        let previous = state.prior();
        state.observe(sample.value);
        state.last_timestamp = Some(sample.timestamp);

        let observation = if self.config.detectors.isolation_forest.enabled {
            self.features.observe(&sample)
        } else {
            None
        };

        let ctx = DetectionContext::new(&sample, &state, &previous)
            .with_features(observation.as_ref());
        let candidates = self.detectors.evaluate_all(&ctx);
        drop(state);

        if observation.is_some() {
            self.maybe_retrain(&sample.cell_id);
        }

        let event = self.aggregator.aggregate(sample, candidates);
        self.counters.record_processed(event.is_anomalous);

        if event.is_anomalous {
            debug!(
                "Anomaly on {}/{}: severity={:.3}, kinds={:?}",
                event.sample.cell_id,
                event.sample.kpi_name,
                event.aggregate_severity,
                event.kinds()
            );
            self.dispatch(&event);
        }

        Ok(event)
    }

    fn maybe_retrain(&self, cell_id: &str) {
        let has_model = self.registry.has_model(cell_id);
        if let Some(snapshot) = self.features.take_retrain_snapshot(cell_id, has_model) {
            if self.registry.schedule_retrain(cell_id, snapshot).is_some() {
                self.counters.record_retrain();
            }
        }
    }

    fn dispatch(&self, event: &AnomalyEvent) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if let Some(alert) = AlertRecord::from_event(event, &self.config.alerts) {
            dispatcher.dispatch(alert);
        }
    }
}
