//! ワイド形式のKPIレコード（取り込み・合成データ生成の単位）

use super::sample::{names, KpiSample, TrafficProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1セル・1時刻分のKPIレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkKpiRecord {
    pub timestamp: DateTime<Utc>,
    /// gNodeB セル識別子
    pub cell_id: String,
    pub traffic_profile: TrafficProfile,
    /// エンドツーエンド遅延（ms）
    pub latency_ms: f64,
    /// スループット（Mbps）
    pub throughput_mbps: f64,
    /// パケットロス率（%）
    pub packet_loss_pct: f64,
    /// ジッター（ms）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    /// 受信電力（dBm）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength_dbm: Option<f64>,
    /// 接続UE数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_users: Option<u32>,
}

impl NetworkKpiRecord {
    /// KPIごとのサンプルに分解
    ///
    /// 順序は固定（latency, throughput, packet_loss, jitter, signal, users）。
    pub fn into_samples(&self) -> Vec<KpiSample> {
        let mut fields: Vec<(&str, f64)> = vec![
            (names::LATENCY_MS, self.latency_ms),
            (names::THROUGHPUT_MBPS, self.throughput_mbps),
            (names::PACKET_LOSS_PCT, self.packet_loss_pct),
        ];
        if let Some(jitter) = self.jitter_ms {
            fields.push((names::JITTER_MS, jitter));
        }
        if let Some(signal) = self.signal_strength_dbm {
            fields.push((names::SIGNAL_STRENGTH_DBM, signal));
        }
        if let Some(users) = self.active_users {
            fields.push((names::ACTIVE_USERS, users as f64));
        }

        fields
            .into_iter()
            .map(|(name, value)| {
                KpiSample::new(
                    self.cell_id.clone(),
                    self.traffic_profile,
                    self.timestamp,
                    name,
                    value,
                )
            })
            .collect()
    }
}

/// 取り込みバッチ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiBatch {
    pub kpis: Vec<NetworkKpiRecord>,
    /// データソース識別子
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "synthetic".to_string()
}

impl KpiBatch {
    /// 全レコードをサンプル列に展開
    pub fn samples(&self) -> Vec<KpiSample> {
        self.kpis.iter().flat_map(|r| r.into_samples()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NetworkKpiRecord {
        NetworkKpiRecord {
            timestamp: Utc::now(),
            cell_id: "gNB_001_Cell_1".to_string(),
            traffic_profile: TrafficProfile::Embb,
            latency_ms: 15.5,
            throughput_mbps: 850.2,
            packet_loss_pct: 0.05,
            jitter_ms: Some(2.1),
            signal_strength_dbm: None,
            active_users: Some(45),
        }
    }

    #[test]
    fn test_into_samples_skips_missing_fields() {
        let samples = record().into_samples();
        let names: Vec<&str> = samples.iter().map(|s| s.kpi_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["latency_ms", "throughput_mbps", "packet_loss_pct", "jitter_ms", "active_users"]
        );
        assert_eq!(samples[4].value, 45.0);
    }

    #[test]
    fn test_batch_source_defaults_to_synthetic() {
        let json = serde_json::json!({ "kpis": [record()] });
        let batch: KpiBatch = serde_json::from_value(json).unwrap();
        assert_eq!(batch.source, "synthetic");
        assert_eq!(batch.samples().len(), 5);
    }
}
