//! セル単位のモデルレジストリと再学習スケジューラ
//!
//! 推論は常に最後に学習が完了したモデル（不変スナップショット）を参照する。
//! 再学習はバックグラウンドで行い、完了後に `Arc` を差し替える。

use super::model::{ModelInfo, TrainedModel};
use crate::config::IsolationForestConfig;
use crate::error::TrainingError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct PendingRetrain {
    generation: u64,
    token: CancellationToken,
}

/// 学習済みモデルの保管庫
pub struct ModelRegistry {
    config: IsolationForestConfig,
    models: RwLock<HashMap<String, Arc<TrainedModel>>>,
    pending: Mutex<HashMap<String, PendingRetrain>>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl ModelRegistry {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self {
            config,
            models: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// 現在のモデル（なければ None）
    pub fn model(&self, cell_id: &str) -> Option<Arc<TrainedModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cell_id)
            .cloned()
    }

    pub fn has_model(&self, cell_id: &str) -> bool {
        self.model(cell_id).is_some()
    }

    /// モデルを差し替える
    pub fn install(&self, cell_id: &str, model: Arc<TrainedModel>) {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cell_id.to_string(), model);
    }

    /// 学習済みセルのモデル情報
    pub fn infos(&self) -> Vec<(String, ModelInfo)> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<(String, ModelInfo)> = models
            .iter()
            .map(|(cell, model)| (cell.clone(), model.info().clone()))
            .collect();
        infos.sort_by(|a, b| a.0.cmp(&b.0));
        infos
    }

    /// 実行中の再学習があるか
    pub fn is_retraining(&self, cell_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(cell_id)
    }

    /// バックグラウンド再学習を予約
    ///
    /// 同じセルの実行中の再学習は置き換えられる。Tokio ランタイム外では何もしない。
    pub fn schedule_retrain(
        self: &Arc<Self>,
        cell_id: &str,
        snapshot: Vec<Vec<f64>>,
    ) -> Option<JoinHandle<Result<Arc<TrainedModel>, TrainingError>>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No Tokio runtime available, skipping retrain for {}", cell_id);
                return None;
            }
        };
        if self.shutdown.is_cancelled() {
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.shutdown.child_token();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = pending.insert(
                cell_id.to_string(),
                PendingRetrain {
                    generation,
                    token: token.clone(),
                },
            ) {
                debug!("Superseding retrain generation {} for {}", previous.generation, cell_id);
                previous.token.cancel();
            }
        }

        let registry = Arc::clone(self);
        let cell = cell_id.to_string();
        debug!(
            "Scheduling retrain for {} with {} vectors (generation {})",
            cell,
            snapshot.len(),
            generation
        );

        Some(runtime.spawn(async move {
            let config = registry.config.clone();
            let training = tokio::task::spawn_blocking(move || {
                TrainedModel::train_from_rows(&snapshot, &config, 0)
            });

            let outcome = tokio::select! {
                _ = token.cancelled() => Err(TrainingError::Cancelled),
                joined = training => joined
                    .map_err(|e| TrainingError::TaskFailed(e.to_string()))
                    .and_then(|result| result),
            };

            let result = match outcome {
                Ok(mut model) if !token.is_cancelled() && registry.is_current(&cell, generation) => {
                    let version = registry.model(&cell).map(|m| m.info().version).unwrap_or(0) + 1;
                    model.set_version(version);
                    let model = Arc::new(model);
                    registry.install(&cell, Arc::clone(&model));
                    info!(
                        "Installed isolation forest v{} for {} ({} samples)",
                        version,
                        cell,
                        model.info().training_samples
                    );
                    Ok(model)
                }
                Ok(_) => Err(TrainingError::Cancelled),
                Err(TrainingError::Cancelled) => {
                    debug!("Retrain generation {} for {} cancelled", generation, cell);
                    Err(TrainingError::Cancelled)
                }
                Err(e) => {
                    warn!("Retrain failed for {}, keeping previous model: {}", cell, e);
                    Err(e)
                }
            };

            registry.finish(&cell, generation);
            result
        }))
    }

    /// 再学習して完了を待つ
    pub async fn retrain(
        self: &Arc<Self>,
        cell_id: &str,
        snapshot: Vec<Vec<f64>>,
    ) -> Result<Arc<TrainedModel>, TrainingError> {
        match self.schedule_retrain(cell_id, snapshot) {
            Some(handle) => handle
                .await
                .map_err(|e| TrainingError::TaskFailed(e.to_string()))?,
            None => Err(TrainingError::TaskFailed(
                "retraining unavailable".to_string(),
            )),
        }
    }

    /// 全ての再学習を取り消す（以降の予約も受け付けない）
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn is_current(&self, cell_id: &str, generation: u64) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cell_id)
            .is_some_and(|p| p.generation == generation)
    }

    fn finish(&self, cell_id: &str, generation: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(cell_id).is_some_and(|p| p.generation == generation) {
            pending.remove(cell_id);
        }
    }
}
