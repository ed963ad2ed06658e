//! トラフィックプロファイル別スループット低下検知器

use super::types::{AnomalyCandidate, AnomalyKind, DetectionContext};
use super::Detector;
use crate::baseline::PriorBaseline;
use crate::config::ThroughputDropConfig;
use crate::error::DetectorError;
use crate::kpi::TrafficProfile;

/// プロファイル下限と過去の長期平均の両方を下回ったときに検知
///
/// 比較対象は取り込み前の長期ウィンドウ（低下値自身で基準が下がらないように）。
pub struct ThroughputDropDetector {
    config: ThroughputDropConfig,
}

impl ThroughputDropDetector {
    pub fn new(config: ThroughputDropConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        profile: TrafficProfile,
        value: f64,
        previous: &PriorBaseline,
    ) -> Option<AnomalyCandidate> {
        if previous.long_len < self.config.min_history.max(1) {
            return None;
        }
        let long_mean = previous.long_mean?;
        let floor = self.config.floors.floor(profile);

        let below_floor = value < floor * (1.0 - self.config.drop_threshold);
        let below_baseline = value < long_mean * (1.0 - self.config.baseline_margin);
        if !(below_floor && below_baseline) {
            return None;
        }

        let floor_drop = 1.0 - value / floor;
        let baseline_drop = 1.0 - value / long_mean;
        let severity = ((floor_drop + baseline_drop) / 2.0).clamp(0.0, 1.0);

        Some(
            AnomalyCandidate::new(self.name(), AnomalyKind::ThroughputDrop, severity)
                .with_evidence("floor", floor)
                .with_evidence("long_mean", long_mean)
                .with_evidence("floor_drop", floor_drop)
                .with_evidence("baseline_drop", baseline_drop),
        )
    }
}

impl Detector for ThroughputDropDetector {
    fn name(&self) -> &'static str {
        "throughput_drop"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::ThroughputDrop
    }

    fn evaluate(
        &self,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<AnomalyCandidate>, DetectorError> {
        if ctx.sample.kpi_name != self.config.kpi_name {
            return Ok(None);
        }
        Ok(self.score(ctx.sample.traffic_profile, ctx.sample.value, ctx.previous))
    }
}
