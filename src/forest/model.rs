//! Isolation Forest モデル
//!
//! スコアは標準的な規約 `-2^(-E[h(x)] / c(psi))` に従う（負に大きいほど異常）。
//! 学習時に contamination 分位点でしきい値を較正し、重大度への固定アフィン写像を得る。

use super::tree::{average_path_length, IsolationTree};
use crate::config::IsolationForestConfig;
use crate::error::TrainingError;
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 学習済みフォレスト
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// 実際に使用したサブサンプルサイズ ψ
    sample_size: usize,
    n_features: usize,
}

impl IsolationForest {
    /// データ行列（行 = サンプル）から学習
    pub fn fit(
        data: &Array2<f64>,
        n_trees: usize,
        sample_size: usize,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        let n_rows = data.nrows();
        if n_rows < 2 {
            return Err(TrainingError::InsufficientData { got: n_rows, need: 2 });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(TrainingError::Degenerate("non-finite feature value".to_string()));
        }
        let has_spread = data.columns().into_iter().any(|col| {
            let first = col[0];
            col.iter().any(|&v| v != first)
        });
        if !has_spread {
            return Err(TrainingError::Degenerate(
                "all feature vectors are identical".to_string(),
            ));
        }

        let psi = sample_size.min(n_rows).max(2);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..n_trees)
            .map(|_| {
                let rows = index::sample(&mut rng, n_rows, psi).into_vec();
                IsolationTree::build(data, rows, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            sample_size: psi,
            n_features: data.ncols(),
        })
    }

    /// 生スコア（-1.0 に近いほど異常、-0.5 付近が正常）
    pub fn score(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size).max(f64::EPSILON);
        -(2f64.powf(-mean_path / c))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// モデルのメタ情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// セル内でのモデルバージョン
    pub version: u64,
    /// 学習サンプル数
    pub training_samples: usize,
    /// 学習完了時刻
    pub trained_at: DateTime<Utc>,
    /// 較正済みしきい値（これ未満を異常とする）
    pub offset: f64,
}

/// 較正済みモデル（不変スナップショットとして共有される）
#[derive(Debug, Clone)]
pub struct TrainedModel {
    forest: IsolationForest,
    info: ModelInfo,
}

impl TrainedModel {
    /// 学習と較正
    pub fn train(
        data: &Array2<f64>,
        config: &IsolationForestConfig,
        version: u64,
    ) -> Result<Self, TrainingError> {
        if data.nrows() < config.min_training_samples {
            return Err(TrainingError::InsufficientData {
                got: data.nrows(),
                need: config.min_training_samples,
            });
        }

        let forest =
            IsolationForest::fit(data, config.n_trees, config.sample_size, config.seed)?;

        let mut scores: Vec<f64> = data.rows().into_iter().map(|row| forest.score(row)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let rank = ((config.contamination * scores.len() as f64).floor() as usize)
            .min(scores.len() - 1);
        let offset = scores[rank];

        debug!(
            "Calibrated isolation forest: offset={:.4}, min={:.4}, max={:.4}",
            offset,
            scores[0],
            scores[scores.len() - 1]
        );
        info!(
            "Isolation forest trained with {} samples, {} features, {} trees",
            data.nrows(),
            data.ncols(),
            forest.n_trees()
        );

        Ok(Self {
            forest,
            info: ModelInfo {
                version,
                training_samples: data.nrows(),
                trained_at: Utc::now(),
                offset,
            },
        })
    }

    /// 行ベクタ群から学習
    pub fn train_from_rows(
        rows: &[Vec<f64>],
        config: &IsolationForestConfig,
        version: u64,
    ) -> Result<Self, TrainingError> {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n_features) || n_features == 0 {
            return Err(TrainingError::Degenerate(
                "inconsistent feature dimensions".to_string(),
            ));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| TrainingError::Degenerate(e.to_string()))?;
        Self::train(&data, config, version)
    }

    /// 生スコア
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        self.forest.score(ArrayView1::from(features))
    }

    /// 較正済みアフィン写像で [0, 1] の重大度に変換
    pub fn severity(&self, raw_score: f64) -> f64 {
        let span = (self.info.offset + 1.0).max(f64::EPSILON);
        ((self.info.offset - raw_score) / span).clamp(0.0, 1.0)
    }

    /// しきい値を下回るか
    pub fn is_outlier(&self, raw_score: f64) -> bool {
        raw_score < self.info.offset
    }

    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.info.version = version;
    }
}
