//! Anomaly Detection Types
//!
//! 検知器の入出力型

use crate::baseline::{BaselineState, PriorBaseline};
use crate::forest::FeatureVector;
use crate::kpi::KpiSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 検知アルゴリズムの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Z-スコア法
    Zscore,
    /// 短期・長期ウィンドウ乖離
    BaselineDeviation,
    /// Isolation Forest（多変量）
    IsolationForest,
    /// プロファイル別スループット低下
    ThroughputDrop,
    /// 変動係数によるトラフィック不安定
    TrafficInstability,
}

impl AnomalyKind {
    /// 同点時の優先度（大きいほど先）
    pub fn priority(&self) -> u8 {
        match self {
            Self::IsolationForest => 5,
            Self::BaselineDeviation => 4,
            Self::Zscore => 3,
            Self::ThroughputDrop => 2,
            Self::TrafficInstability => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zscore => "ZSCORE",
            Self::BaselineDeviation => "BASELINE_DEVIATION",
            Self::IsolationForest => "ISOLATION_FOREST",
            Self::ThroughputDrop => "THROUGHPUT_DROP",
            Self::TrafficInstability => "TRAFFIC_INSTABILITY",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 検知器が出力する異常候補
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCandidate {
    /// 検知器名
    pub detector_name: String,
    /// 重大度（0.0-1.0）
    pub severity_score: f64,
    pub kind: AnomalyKind,
    /// 検知器固有の診断値
    pub evidence: BTreeMap<String, f64>,
}

impl AnomalyCandidate {
    /// 新しい候補を作成（重大度は [0, 1] にクランプ）
    pub fn new(detector_name: impl Into<String>, kind: AnomalyKind, severity_score: f64) -> Self {
        let severity_score = if severity_score.is_nan() {
            0.0
        } else {
            severity_score.clamp(0.0, 1.0)
        };
        Self {
            detector_name: detector_name.into(),
            severity_score,
            kind,
            evidence: BTreeMap::new(),
        }
    }

    /// 診断値を追加
    pub fn with_evidence(mut self, key: impl Into<String>, value: f64) -> Self {
        self.evidence.insert(key.into(), value);
        self
    }
}

/// 1サンプル分の検知入力
///
/// `baseline` はこのサンプルを取り込んだ後の状態、`previous` は取り込む前の要約。
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub sample: &'a KpiSample,
    pub baseline: &'a BaselineState,
    pub previous: &'a PriorBaseline,
    /// セルの整列済み特徴量（行が揃った場合のみ）
    pub features: Option<&'a FeatureVector>,
}

impl<'a> DetectionContext<'a> {
    pub fn new(
        sample: &'a KpiSample,
        baseline: &'a BaselineState,
        previous: &'a PriorBaseline,
    ) -> Self {
        Self {
            sample,
            baseline,
            previous,
            features: None,
        }
    }

    pub fn with_features(mut self, features: Option<&'a FeatureVector>) -> Self {
        self.features = features;
        self
    }
}
