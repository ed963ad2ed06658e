//! Aggregator / Scorer
//!
//! 1サンプル分の異常候補を1件のランク付きイベントに統合する。

use crate::detectors::{AnomalyCandidate, AnomalyKind};
use crate::kpi::KpiSample;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// 1サンプルに対する検知結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub sample: KpiSample,
    /// 重大度の降順
    pub candidates: Vec<AnomalyCandidate>,
    /// 統合重大度（0.0-1.0）
    pub aggregate_severity: f64,
    pub is_anomalous: bool,
}

impl AnomalyEvent {
    /// 最上位の候補
    pub fn primary(&self) -> Option<&AnomalyCandidate> {
        self.candidates.first()
    }

    /// 検知した種別（重複なし、候補順）
    pub fn kinds(&self) -> Vec<AnomalyKind> {
        let mut seen = BTreeSet::new();
        self.candidates
            .iter()
            .filter(|c| seen.insert(c.kind))
            .map(|c| c.kind)
            .collect()
    }
}

/// 候補の統合器
#[derive(Debug, Clone)]
pub struct Aggregator {
    corroboration_bonus: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Aggregator {
    pub fn new(corroboration_bonus: f64) -> Self {
        Self {
            corroboration_bonus: corroboration_bonus.max(0.0),
        }
    }

    /// 候補を統合
    ///
    /// 最大重大度に、2種類以上の検知器が一致した場合のボーナスを加える（上限 1.0）。
    pub fn aggregate(
        &self,
        sample: KpiSample,
        mut candidates: Vec<AnomalyCandidate>,
    ) -> AnomalyEvent {
        candidates.sort_by(rank);

        let distinct: BTreeSet<AnomalyKind> = candidates.iter().map(|c| c.kind).collect();
        let max_severity = candidates
            .iter()
            .map(|c| c.severity_score)
            .fold(0.0_f64, f64::max);
        let bonus = if distinct.len() >= 2 {
            self.corroboration_bonus
        } else {
            0.0
        };

        AnomalyEvent {
            sample,
            is_anomalous: !candidates.is_empty(),
            aggregate_severity: (max_severity + bonus).clamp(0.0, 1.0),
            candidates,
        }
    }
}

fn rank(a: &AnomalyCandidate, b: &AnomalyCandidate) -> Ordering {
    b.severity_score
        .total_cmp(&a.severity_score)
        .then_with(|| b.kind.priority().cmp(&a.kind.priority()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::{names, TrafficProfile};
    use chrono::Utc;

    fn sample() -> KpiSample {
        KpiSample::new("cell-1", TrafficProfile::Embb, Utc::now(), names::LATENCY_MS, 80.0)
    }

    fn candidate(kind: AnomalyKind, severity: f64) -> AnomalyCandidate {
        AnomalyCandidate::new(kind.as_str().to_lowercase(), kind, severity)
    }

    #[test]
    fn test_no_candidates() {
        let event = Aggregator::default().aggregate(sample(), vec![]);
        assert!(!event.is_anomalous);
        assert_eq!(event.aggregate_severity, 0.0);
        assert!(event.primary().is_none());
    }

    #[test]
    fn test_corroboration_scenario() {
        let event = Aggregator::default().aggregate(
            sample(),
            vec![
                candidate(AnomalyKind::Zscore, 0.6),
                candidate(AnomalyKind::BaselineDeviation, 0.7),
            ],
        );
        assert!(event.is_anomalous);
        assert!((event.aggregate_severity - 0.8).abs() < 1e-12);
        assert_eq!(event.primary().unwrap().kind, AnomalyKind::BaselineDeviation);
    }

    #[test]
    fn test_single_kind_no_bonus() {
        let event = Aggregator::default().aggregate(
            sample(),
            vec![
                candidate(AnomalyKind::Zscore, 0.6),
                candidate(AnomalyKind::Zscore, 0.4),
            ],
        );
        assert_eq!(event.aggregate_severity, 0.6);
        assert_eq!(event.kinds(), vec![AnomalyKind::Zscore]);
    }

    #[test]
    fn test_capped_at_one() {
        let event = Aggregator::default().aggregate(
            sample(),
            vec![
                candidate(AnomalyKind::Zscore, 1.0),
                candidate(AnomalyKind::IsolationForest, 0.95),
            ],
        );
        assert_eq!(event.aggregate_severity, 1.0);
    }

    #[test]
    fn test_ties_broken_by_priority() {
        let event = Aggregator::default().aggregate(
            sample(),
            vec![
                candidate(AnomalyKind::TrafficInstability, 0.5),
                candidate(AnomalyKind::Zscore, 0.5),
                candidate(AnomalyKind::ThroughputDrop, 0.5),
                candidate(AnomalyKind::IsolationForest, 0.5),
                candidate(AnomalyKind::BaselineDeviation, 0.5),
            ],
        );
        assert_eq!(
            event.kinds(),
            vec![
                AnomalyKind::IsolationForest,
                AnomalyKind::BaselineDeviation,
                AnomalyKind::Zscore,
                AnomalyKind::ThroughputDrop,
                AnomalyKind::TrafficInstability,
            ]
        );
    }

    #[test]
    fn test_adding_agreeing_detector_never_lowers_severity() {
        let aggregator = Aggregator::default();
        let kinds = [
            AnomalyKind::Zscore,
            AnomalyKind::BaselineDeviation,
            AnomalyKind::IsolationForest,
            AnomalyKind::ThroughputDrop,
            AnomalyKind::TrafficInstability,
        ];
        let severities = [0.3, 0.1, 0.55, 0.2, 0.9];

        let mut previous = 0.0;
        for n in 1..=kinds.len() {
            let candidates = kinds[..n]
                .iter()
                .zip(severities)
                .map(|(k, s)| candidate(*k, s))
                .collect();
            let event = aggregator.aggregate(sample(), candidates);
            assert!((0.0..=1.0).contains(&event.aggregate_severity));
            assert!(event.aggregate_severity >= previous);
            previous = event.aggregate_severity;
        }
    }
}
