//! Z-スコア検知器

use super::types::{AnomalyCandidate, AnomalyKind, DetectionContext};
use super::Detector;
use crate::baseline::BaselineState;
use crate::config::ZScoreConfig;
use crate::error::DetectorError;

/// 取り込み後のベースライン（平均・分散）に対する Z-スコア
pub struct ZScoreDetector {
    config: ZScoreConfig,
}

impl ZScoreDetector {
    pub fn new(config: ZScoreConfig) -> Self {
        Self { config }
    }

    /// 値をベースラインと比較
    ///
    /// 分散 0 でも epsilon 下限により失敗しない。
    pub fn score(&self, value: f64, baseline: &BaselineState) -> Option<AnomalyCandidate> {
        if baseline.count < self.config.min_samples {
            return None;
        }

        let std_dev = baseline.variance.max(0.0).sqrt().max(self.config.epsilon);
        let z = (value - baseline.mean) / std_dev;
        if !z.is_finite() || z.abs() <= self.config.threshold {
            return None;
        }

        let severity = (z.abs() / (3.0 * self.config.threshold)).min(1.0);
        Some(
            AnomalyCandidate::new(self.name(), AnomalyKind::Zscore, severity)
                .with_evidence("z_score", z)
                .with_evidence("mean", baseline.mean)
                .with_evidence("std_dev", std_dev)
                .with_evidence("threshold", self.config.threshold),
        )
    }
}

impl Detector for ZScoreDetector {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::Zscore
    }

    fn evaluate(
        &self,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<AnomalyCandidate>, DetectorError> {
        Ok(self.score(ctx.sample.value, ctx.baseline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ZScoreDetector {
        ZScoreDetector::new(ZScoreConfig::default())
    }

    #[test]
    fn test_scenario_z_three_point_five() {
        let baseline = BaselineState::from_moments(50, 100.0, 100.0);
        let candidate = detector().score(135.0, &baseline).unwrap();

        assert_eq!(candidate.kind, AnomalyKind::Zscore);
        assert!((candidate.evidence["z_score"] - 3.5).abs() < 1e-12);
        assert!((candidate.severity_score - 3.5 / 9.0).abs() < 1e-12);
        assert!((candidate.severity_score - 0.39).abs() < 0.01);
    }

    #[test]
    fn test_within_threshold_is_quiet() {
        let baseline = BaselineState::from_moments(50, 100.0, 100.0);
        assert!(detector().score(125.0, &baseline).is_none());
        assert!(detector().score(70.0, &baseline).is_none());
    }

    #[test]
    fn test_negative_deviation_flagged() {
        let baseline = BaselineState::from_moments(50, 100.0, 100.0);
        let candidate = detector().score(40.0, &baseline).unwrap();
        assert!(candidate.evidence["z_score"] < 0.0);
        assert_eq!(candidate.severity_score, 1.0 * (6.0 / 9.0));
    }

    #[test]
    fn test_warm_up_required() {
        let baseline = BaselineState::from_moments(4, 100.0, 100.0);
        assert!(detector().score(1000.0, &baseline).is_none());
    }

    #[test]
    fn test_constant_series_never_fails() {
        let mut baseline = BaselineState::new(20, 200);
        for _ in 0..50 {
            baseline.observe(5.0);
        }
        assert!(detector().score(5.0, &baseline).is_none());

        // ゼロ分散でも epsilon 下限で有限の z になる
        let candidate = detector().score(5.001, &baseline).unwrap();
        assert!(candidate.evidence["z_score"].is_finite());
        assert_eq!(candidate.severity_score, 1.0);
    }

    #[test]
    fn test_severity_capped() {
        let baseline = BaselineState::from_moments(50, 0.0, 1.0);
        let candidate = detector().score(1e9, &baseline).unwrap();
        assert_eq!(candidate.severity_score, 1.0);
    }
}
