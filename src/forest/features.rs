//! セル単位の多変量特徴量ベクトル組み立て
//!
//! 複数のKPI系列をタイムスタンプで整列し、1行の特徴量ベクトルに結合する。

use crate::config::IsolationForestConfig;
use crate::kpi::KpiSample;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// 組み立て途中の行を保持する上限（セルごと）
const MAX_PENDING_ROWS: usize = 64;

/// 整列済み特徴量ベクトル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cell_id: String,
    /// 行のアンカー時刻（行に最初に入ったサンプルの時刻）
    pub timestamp: DateTime<Utc>,
    /// feature_kpis の順に並んだ値
    pub values: Vec<f64>,
}

/// 組み立て途中の行
#[derive(Debug)]
struct PendingRow {
    anchor: DateTime<Utc>,
    slots: Vec<Option<f64>>,
}

impl PendingRow {
    fn new(anchor: DateTime<Utc>, n_features: usize) -> Self {
        Self {
            anchor,
            slots: vec![None; n_features],
        }
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

#[derive(Debug, Default)]
struct CellFeatures {
    pending: VecDeque<PendingRow>,
    history: VecDeque<Vec<f64>>,
    rows_since_retrain: usize,
    initial_attempted: bool,
}

/// セルごとの特徴量履歴ストア
///
/// 各サンプルは、その特徴量がまだ空いている行のうちアンカーが許容幅内で最も近い行に入る。
/// 該当する行がなければそのサンプルをアンカーとする新しい行を作る。
/// 値は1つの行にしか使われず、全特徴量が揃った行だけが履歴に追加される。
pub struct FeatureStore {
    feature_kpis: Vec<String>,
    tolerance: Duration,
    history_capacity: usize,
    min_training_samples: usize,
    retrain_every: usize,
    cells: Mutex<HashMap<String, CellFeatures>>,
}

impl FeatureStore {
    pub fn new(config: &IsolationForestConfig) -> Self {
        Self {
            feature_kpis: config.feature_kpis.clone(),
            tolerance: Duration::milliseconds(config.alignment_tolerance_ms),
            history_capacity: config.history_capacity.max(1),
            min_training_samples: config.min_training_samples,
            retrain_every: config.retrain_every.max(1),
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn feature_kpis(&self) -> &[String] {
        &self.feature_kpis
    }

    /// サンプルを取り込み、行が完成したら履歴に追加してそのベクトルを返す
    pub fn observe(&self, sample: &KpiSample) -> Option<FeatureVector> {
        let position = self.feature_kpis.iter().position(|k| *k == sample.kpi_name)?;
        let n_features = self.feature_kpis.len();

        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let cell = cells.entry(sample.cell_id.clone()).or_default();

        // 同点なら古い行を優先
        let nearest = cell
            .pending
            .iter()
            .enumerate()
            .filter(|(_, row)| row.slots[position].is_none())
            .map(|(i, row)| (i, (row.anchor - sample.timestamp).abs()))
            .filter(|(_, gap)| *gap <= self.tolerance)
            .min_by_key(|(_, gap)| *gap)
            .map(|(i, _)| i);

        let index = match nearest {
            Some(index) => index,
            None => {
                if cell.pending.len() >= MAX_PENDING_ROWS {
                    cell.pending.pop_front();
                }
                cell.pending.push_back(PendingRow::new(sample.timestamp, n_features));
                cell.pending.len() - 1
            }
        };

        let row = &mut cell.pending[index];
        row.slots[position] = Some(sample.value);
        if !row.is_complete() {
            return None;
        }

        let row = cell.pending.remove(index)?;
        let values: Vec<f64> = row.slots.into_iter().flatten().collect();
        if cell.history.len() >= self.history_capacity {
            cell.history.pop_front();
        }
        cell.history.push_back(values.clone());
        cell.rows_since_retrain += 1;

        Some(FeatureVector {
            cell_id: sample.cell_id.clone(),
            timestamp: row.anchor,
            values,
        })
    }

    /// 再学習の時期であれば履歴スナップショットを返し、カウンタをリセットする
    pub fn take_retrain_snapshot(&self, cell_id: &str, has_model: bool) -> Option<Vec<Vec<f64>>> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let cell = cells.get_mut(cell_id)?;
        if cell.history.len() < self.min_training_samples {
            return None;
        }

        let initial = !has_model && !cell.initial_attempted;
        if !initial && cell.rows_since_retrain < self.retrain_every {
            return None;
        }

        cell.initial_attempted = true;
        cell.rows_since_retrain = 0;
        Some(cell.history.iter().cloned().collect())
    }

    /// 現在の履歴スナップショット（カウンタは変更しない）
    pub fn snapshot(&self, cell_id: &str) -> Vec<Vec<f64>> {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .get(cell_id)
            .map(|c| c.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 履歴件数
    pub fn history_len(&self, cell_id: &str) -> usize {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.get(cell_id).map(|c| c.history.len()).unwrap_or(0)
    }
}
