//! 異常注入

use crate::kpi::NetworkKpiRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 注入された異常（正解ラベル）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InjectedAnomaly {
    /// 遅延スパイク（ジッターも倍率 * 0.8 で増加）
    LatencySpike { multiplier: f64 },
    /// スループット低下（パケットロス3倍、上限10%）
    ThroughputDrop { factor: f64 },
    /// 輻輳（遅延2.5倍、スループット半減、ロス4倍で上限8%、UE数1.8倍）
    Congestion,
}

impl InjectedAnomaly {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LatencySpike { .. } => "latency_spike",
            Self::ThroughputDrop { .. } => "throughput_drop",
            Self::Congestion => "congestion",
        }
    }

    /// レコードに異常を適用
    pub fn apply(&self, record: &mut NetworkKpiRecord) {
        match *self {
            Self::LatencySpike { multiplier } => {
                record.latency_ms *= multiplier;
                if let Some(jitter) = record.jitter_ms.as_mut() {
                    *jitter *= multiplier * 0.8;
                }
            }
            Self::ThroughputDrop { factor } => {
                record.throughput_mbps *= factor;
                record.packet_loss_pct = (record.packet_loss_pct * 3.0).min(10.0);
            }
            Self::Congestion => {
                record.latency_ms *= 2.5;
                record.throughput_mbps *= 0.5;
                record.packet_loss_pct = (record.packet_loss_pct * 4.0).min(8.0);
                if let Some(users) = record.active_users.as_mut() {
                    *users = (*users as f64 * 1.8) as u32;
                }
            }
        }
    }
}

impl fmt::Display for InjectedAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::TrafficProfile;
    use chrono::Utc;

    fn record() -> NetworkKpiRecord {
        NetworkKpiRecord {
            timestamp: Utc::now(),
            cell_id: "gNB_001_Cell_1".to_string(),
            traffic_profile: TrafficProfile::Embb,
            latency_ms: 20.0,
            throughput_mbps: 800.0,
            packet_loss_pct: 3.0,
            jitter_ms: Some(2.0),
            signal_strength_dbm: Some(-70.0),
            active_users: Some(50),
        }
    }

    #[test]
    fn test_latency_spike() {
        let mut r = record();
        InjectedAnomaly::LatencySpike { multiplier: 3.0 }.apply(&mut r);
        assert_eq!(r.latency_ms, 60.0);
        assert!((r.jitter_ms.unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(r.throughput_mbps, 800.0);
    }

    #[test]
    fn test_throughput_drop_caps_loss() {
        let mut r = record();
        InjectedAnomaly::ThroughputDrop { factor: 0.4 }.apply(&mut r);
        assert_eq!(r.throughput_mbps, 320.0);
        assert_eq!(r.packet_loss_pct, 9.0);

        InjectedAnomaly::ThroughputDrop { factor: 0.4 }.apply(&mut r);
        assert_eq!(r.packet_loss_pct, 10.0);
    }

    #[test]
    fn test_congestion() {
        let mut r = record();
        InjectedAnomaly::Congestion.apply(&mut r);
        assert_eq!(r.latency_ms, 50.0);
        assert_eq!(r.throughput_mbps, 400.0);
        assert_eq!(r.packet_loss_pct, 8.0);
        assert_eq!(r.active_users, Some(90));
    }

    #[test]
    fn test_label_serde() {
        let json = serde_json::to_string(&InjectedAnomaly::Congestion).unwrap();
        assert_eq!(json, r#"{"type":"congestion"}"#);
    }
}
