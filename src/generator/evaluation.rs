//! 検知結果の評価（注入ラベルとの突き合わせ）

use super::stream::LabeledRecord;
use crate::aggregator::AnomalyEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 評価結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl EvaluationReport {
    fn from_counts(tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
            precision,
            recall,
            f1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }
}

/// レコード単位で評価
///
/// レコードのいずれかのKPIで異常イベントが出ていれば「異常と予測」とみなす。
pub fn evaluate(records: &[LabeledRecord], events: &[AnomalyEvent]) -> EvaluationReport {
    let flagged: HashSet<(&str, DateTime<Utc>)> = events
        .iter()
        .filter(|e| e.is_anomalous)
        .map(|e| (e.sample.cell_id.as_str(), e.sample.timestamp))
        .collect();

    let (mut tp, mut fp, mut fn_, mut tn) = (0, 0, 0, 0);
    for labeled in records {
        let key = (labeled.record.cell_id.as_str(), labeled.record.timestamp);
        match (labeled.is_anomalous(), flagged.contains(&key)) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    EvaluationReport::from_counts(tp, fp, fn_, tn)
}
