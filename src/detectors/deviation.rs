//! 短期・長期ウィンドウ乖離検知器

use super::types::{AnomalyCandidate, AnomalyKind, DetectionContext};
use super::Detector;
use crate::baseline::BaselineState;
use crate::config::BaselineDeviationConfig;
use crate::error::DetectorError;

/// 短期平均が長期平均から相対的にどれだけ離れたかで判定する
pub struct BaselineDeviationDetector {
    config: BaselineDeviationConfig,
}

impl BaselineDeviationDetector {
    pub fn new(config: BaselineDeviationConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, baseline: &BaselineState) -> Option<AnomalyCandidate> {
        if baseline.long_window.fill_ratio() < self.config.min_fill_ratio {
            return None;
        }
        let short_mean = baseline.short_mean()?;
        let long_mean = baseline.long_mean()?;

        let deviation = (short_mean - long_mean).abs() / long_mean.abs().max(self.config.epsilon);
        if !deviation.is_finite() || deviation <= self.config.threshold {
            return None;
        }

        let severity = (deviation / (3.0 * self.config.threshold)).min(1.0);
        Some(
            AnomalyCandidate::new(self.name(), AnomalyKind::BaselineDeviation, severity)
                .with_evidence("deviation", deviation)
                .with_evidence("short_mean", short_mean)
                .with_evidence("long_mean", long_mean),
        )
    }
}

impl Detector for BaselineDeviationDetector {
    fn name(&self) -> &'static str {
        "baseline_deviation"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::BaselineDeviation
    }

    fn evaluate(
        &self,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<AnomalyCandidate>, DetectorError> {
        Ok(self.score(ctx.baseline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[f64]) -> BaselineState {
        let mut state = BaselineState::new(5, 20);
        for v in values {
            state.observe(*v);
        }
        state
    }

    fn detector() -> BaselineDeviationDetector {
        BaselineDeviationDetector::new(BaselineDeviationConfig::default())
    }

    #[test]
    fn test_inert_until_long_window_half_full() {
        let mut values = vec![100.0; 5];
        values.extend([300.0; 4]);
        // 9/20 < 0.5
        assert!(detector().score(&state(&values)).is_none());
    }

    #[test]
    fn test_level_shift_detected() {
        let mut values = vec![100.0; 15];
        values.extend([200.0; 5]);
        let candidate = detector().score(&state(&values)).unwrap();

        // short 200, long 125 -> 0.6
        assert!((candidate.evidence["deviation"] - 0.6).abs() < 1e-12);
        assert!((candidate.severity_score - 0.6 / 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_stable_series_quiet() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        assert!(detector().score(&state(&values)).is_none());
    }

    #[test]
    fn test_zero_long_mean_uses_epsilon() {
        let mut values = vec![0.0; 15];
        values.extend([0.0; 5]);
        assert!(detector().score(&state(&values)).is_none());

        let mut values = vec![-1.0; 10];
        values.extend([1.0; 10]);
        // long mean 0 -> epsilon floor, severity saturates
        let candidate = detector().score(&state(&values)).unwrap();
        assert_eq!(candidate.severity_score, 1.0);
    }
}
