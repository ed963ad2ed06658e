//! Isolation Forest 検知器
//!
//! セルの整列済み特徴量ベクトルを、そのセルの最新モデルで採点する。

use super::types::{AnomalyCandidate, AnomalyKind, DetectionContext};
use super::Detector;
use crate::error::DetectorError;
use crate::forest::ModelRegistry;
use std::sync::Arc;

pub struct IsolationForestDetector {
    registry: Arc<ModelRegistry>,
}

impl IsolationForestDetector {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

impl Detector for IsolationForestDetector {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::IsolationForest
    }

    fn evaluate(
        &self,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<AnomalyCandidate>, DetectorError> {
        let Some(features) = ctx.features else {
            return Ok(None);
        };
        let Some(model) = self.registry.model(&features.cell_id) else {
            return Ok(None);
        };

        if model.n_features() != features.values.len() {
            return Err(DetectorError::DimensionMismatch {
                expected: model.n_features(),
                actual: features.values.len(),
            });
        }

        let raw = model.raw_score(&features.values);
        if !model.is_outlier(raw) {
            return Ok(None);
        }

        let info = model.info();
        Ok(Some(
            AnomalyCandidate::new(self.name(), self.kind(), model.severity(raw))
                .with_evidence("raw_score", raw)
                .with_evidence("offset", info.offset)
                .with_evidence("model_version", info.version as f64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineState;
    use crate::config::IsolationForestConfig;
    use crate::forest::{FeatureVector, TrainedModel};
    use crate::kpi::{names, KpiSample, TrafficProfile};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config() -> IsolationForestConfig {
        IsolationForestConfig {
            min_training_samples: 32,
            n_trees: 50,
            ..IsolationForestConfig::default()
        }
    }

    fn normal_rows(n: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..n)
            .map(|_| {
                vec![
                    rng.gen_range(15.0..25.0),
                    rng.gen_range(700.0..900.0),
                    rng.gen_range(0.05..0.15),
                ]
            })
            .collect()
    }

    fn sample() -> KpiSample {
        KpiSample::new("cell-1", TrafficProfile::Embb, Utc::now(), names::LATENCY_MS, 20.0)
    }

    fn vector(values: Vec<f64>) -> FeatureVector {
        FeatureVector {
            cell_id: "cell-1".to_string(),
            timestamp: Utc::now(),
            values,
        }
    }

    fn registry_with_model() -> Arc<ModelRegistry> {
        let registry = Arc::new(ModelRegistry::new(config()));
        let model = TrainedModel::train_from_rows(&normal_rows(256), &config(), 1).unwrap();
        registry.install("cell-1", Arc::new(model));
        registry
    }

    #[test]
    fn test_no_model_is_inert() {
        let detector = IsolationForestDetector::new(Arc::new(ModelRegistry::new(config())));
        let sample = sample();
        let state = BaselineState::new(20, 200);
        let previous = state.prior();
        let features = vector(vec![500.0, 1.0, 40.0]);
        let ctx = DetectionContext::new(&sample, &state, &previous).with_features(Some(&features));

        assert_eq!(detector.evaluate(&ctx).unwrap(), None);
    }

    #[test]
    fn test_incomplete_row_is_inert() {
        let detector = IsolationForestDetector::new(registry_with_model());
        let sample = sample();
        let state = BaselineState::new(20, 200);
        let previous = state.prior();
        let ctx = DetectionContext::new(&sample, &state, &previous);

        assert_eq!(detector.evaluate(&ctx).unwrap(), None);
    }

    #[test]
    fn test_far_outlier_flagged() {
        let detector = IsolationForestDetector::new(registry_with_model());
        let sample = sample();
        let state = BaselineState::new(20, 200);
        let previous = state.prior();
        let features = vector(vec![500.0, 1.0, 40.0]);
        let ctx = DetectionContext::new(&sample, &state, &previous).with_features(Some(&features));

        let candidate = detector.evaluate(&ctx).unwrap().unwrap();
        assert_eq!(candidate.kind, AnomalyKind::IsolationForest);
        assert!(candidate.severity_score > 0.0);
        assert!(candidate.evidence["raw_score"] < candidate.evidence["offset"]);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let detector = IsolationForestDetector::new(registry_with_model());
        let sample = sample();
        let state = BaselineState::new(20, 200);
        let previous = state.prior();
        let features = vector(vec![20.0, 800.0]);
        let ctx = DetectionContext::new(&sample, &state, &previous).with_features(Some(&features));

        assert!(matches!(
            detector.evaluate(&ctx),
            Err(DetectorError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
