//! トラフィック不安定検知器

use super::types::{AnomalyCandidate, AnomalyKind, DetectionContext};
use super::Detector;
use crate::baseline::RingWindow;
use crate::config::TrafficInstabilityConfig;
use crate::error::DetectorError;

/// 短期ウィンドウの変動係数（CV）で判定
pub struct TrafficInstabilityDetector {
    config: TrafficInstabilityConfig,
}

impl TrafficInstabilityDetector {
    pub fn new(config: TrafficInstabilityConfig) -> Self {
        Self { config }
    }

    fn applies_to(&self, kpi_name: &str) -> bool {
        self.config.volume_kpis.iter().any(|k| k == kpi_name)
    }

    pub fn score(&self, window: &RingWindow) -> Option<AnomalyCandidate> {
        if !window.is_full() {
            return None;
        }
        let mean = window.mean()?;
        let std_dev = window.std_dev()?;

        let cv = std_dev / mean.abs().max(self.config.epsilon);
        if !cv.is_finite() || cv <= self.config.threshold {
            return None;
        }

        let severity = (cv / (2.0 * self.config.threshold)).min(1.0);
        Some(
            AnomalyCandidate::new(self.name(), AnomalyKind::TrafficInstability, severity)
                .with_evidence("cv", cv)
                .with_evidence("window_mean", mean)
                .with_evidence("window_std_dev", std_dev),
        )
    }
}

impl Detector for TrafficInstabilityDetector {
    fn name(&self) -> &'static str {
        "traffic_instability"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::TrafficInstability
    }

    fn evaluate(
        &self,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<AnomalyCandidate>, DetectorError> {
        if !self.applies_to(&ctx.sample.kpi_name) {
            return Ok(None);
        }
        Ok(self.score(&ctx.previous.short_window))
    }
}
