//! KPI統計サマリー

use super::sample::{KpiSample, SeriesKey, TrafficProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 系列ごとの統計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub mean: f64,
    pub median: f64,
    /// 標準偏差（不偏）
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
    /// サンプル数
    pub sample_count: usize,
}

impl KpiSummary {
    /// 値のリストから統計を計算
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        if values.is_empty() {
            return Self::default();
        }

        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = if count > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64
        } else {
            0.0
        };

        Self {
            mean,
            median: percentile(&values, 0.5),
            std_dev: variance.sqrt(),
            min: values[0],
            max: values[count - 1],
            p95: percentile(&values, 0.95),
            p99: percentile(&values, 0.99),
            sample_count: count,
        }
    }
}

impl Default for KpiSummary {
    fn default() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            p95: 0.0,
            p99: 0.0,
            sample_count: 0,
        }
    }
}

/// セル・KPI単位のサマリー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub cell_id: String,
    pub kpi_name: String,
    pub traffic_profile: TrafficProfile,
    #[serde(flatten)]
    pub stats: KpiSummary,
}

/// サンプル列を (cell_id, kpi_name) ごとに集計
pub fn summarize(samples: &[KpiSample]) -> Vec<SeriesSummary> {
    let mut groups: BTreeMap<SeriesKey, (TrafficProfile, Vec<f64>)> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.key())
            .or_insert_with(|| (sample.traffic_profile, Vec::new()))
            .1
            .push(sample.value);
    }

    groups
        .into_iter()
        .map(|(key, (profile, values))| SeriesSummary {
            cell_id: key.cell_id,
            kpi_name: key.kpi_name,
            traffic_profile: profile,
            stats: KpiSummary::from_values(values),
        })
        .collect()
}

/// 線形補間パーセンタイル（ソート済み前提）
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let rank = p * (sorted_values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
}
