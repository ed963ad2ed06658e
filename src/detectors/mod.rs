//! Anomaly Detectors
//!
//! 1サンプルに対して各アルゴリズムが独立に異常候補を出力する。
//! 有効化は設定で切り替える。

mod deviation;
mod instability;
mod isolation;
mod throughput;
mod types;
mod zscore;

pub use deviation::BaselineDeviationDetector;
pub use instability::TrafficInstabilityDetector;
pub use isolation::IsolationForestDetector;
pub use throughput::ThroughputDropDetector;
pub use types::{AnomalyCandidate, AnomalyKind, DetectionContext};
pub use zscore::ZScoreDetector;

use crate::config::DetectorsConfig;
use crate::error::DetectorError;
use crate::forest::ModelRegistry;
use std::sync::Arc;
use tracing::warn;

/// 検知器の共通インターフェース
pub trait Detector: Send + Sync {
    /// 検知器名
    fn name(&self) -> &'static str;

    fn kind(&self) -> AnomalyKind;

    /// サンプルを評価
    ///
    /// 判定に必要な状態が揃っていない場合は `Ok(None)` を返す。
    fn evaluate(&self, ctx: &DetectionContext<'_>)
        -> Result<Option<AnomalyCandidate>, DetectorError>;
}

/// 有効な検知器の集合
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// 設定から有効な検知器を構築
    pub fn from_config(config: &DetectorsConfig, registry: Arc<ModelRegistry>) -> Self {
        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        if config.zscore.enabled {
            detectors.push(Box::new(ZScoreDetector::new(config.zscore.clone())));
        }
        if config.baseline_deviation.enabled {
            detectors.push(Box::new(BaselineDeviationDetector::new(
                config.baseline_deviation.clone(),
            )));
        }
        if config.isolation_forest.enabled {
            detectors.push(Box::new(IsolationForestDetector::new(registry)));
        }
        if config.throughput_drop.enabled {
            detectors.push(Box::new(ThroughputDropDetector::new(
                config.throughput_drop.clone(),
            )));
        }
        if config.traffic_instability.enabled {
            detectors.push(Box::new(TrafficInstabilityDetector::new(
                config.traffic_instability.clone(),
            )));
        }
        Self { detectors }
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// 全検知器を評価（エラーはログに残して候補なしとして扱う）
    pub fn evaluate_all(&self, ctx: &DetectionContext<'_>) -> Vec<AnomalyCandidate> {
        let mut candidates = Vec::new();
        for detector in &self.detectors {
            match detector.evaluate(ctx) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Detector {} failed on {}/{}: {}",
                        detector.name(),
                        ctx.sample.cell_id,
                        ctx.sample.kpi_name,
                        e
                    );
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineState;
    use crate::config::IsolationForestConfig;
    use crate::kpi::{names, KpiSample, TrafficProfile};
    use chrono::Utc;

    struct Failing;

    impl Detector for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn kind(&self) -> AnomalyKind {
            AnomalyKind::Zscore
        }

        fn evaluate(
            &self,
            _ctx: &DetectionContext<'_>,
        ) -> Result<Option<AnomalyCandidate>, DetectorError> {
            Err(DetectorError::StateUnavailable("test".to_string()))
        }
    }

    fn registry() -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::new(IsolationForestConfig::default()))
    }

    #[test]
    fn test_from_config_respects_enabled_flags() {
        let mut config = DetectorsConfig::default();
        assert_eq!(DetectorSet::from_config(&config, registry()).len(), 5);

        config.isolation_forest.enabled = false;
        config.traffic_instability.enabled = false;
        let set = DetectorSet::from_config(&config, registry());
        assert_eq!(
            set.names(),
            vec!["zscore", "baseline_deviation", "throughput_drop"]
        );
    }

    #[test]
    fn test_failing_detector_is_skipped() {
        let set = DetectorSet::new(vec![
            Box::new(Failing),
            Box::new(ZScoreDetector::new(Default::default())),
        ]);
        let sample = KpiSample::new(
            "cell-1",
            TrafficProfile::Embb,
            Utc::now(),
            names::LATENCY_MS,
            135.0,
        );
        let state = BaselineState::from_moments(50, 100.0, 100.0);
        let previous = state.prior();
        let ctx = DetectionContext::new(&sample, &state, &previous);

        let candidates = set.evaluate_all(&ctx);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, AnomalyKind::Zscore);
    }
}
