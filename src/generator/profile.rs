//! トラフィックプロファイル別の正常時パラメータ

use crate::kpi::TrafficProfile;
use serde::{Deserialize, Serialize};

/// 正規分布パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub std_dev: f64,
}

impl Gaussian {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// プロファイルごとのKPI分布
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    pub latency_ms: Gaussian,
    pub throughput_mbps: Gaussian,
    pub packet_loss_pct: Gaussian,
}

impl ProfileParams {
    pub fn for_profile(profile: TrafficProfile) -> Self {
        match profile {
            TrafficProfile::Embb => Self {
                latency_ms: Gaussian::new(20.0, 5.0),
                throughput_mbps: Gaussian::new(800.0, 150.0),
                packet_loss_pct: Gaussian::new(0.1, 0.05),
            },
            TrafficProfile::Urllc => Self {
                latency_ms: Gaussian::new(5.0, 1.5),
                throughput_mbps: Gaussian::new(200.0, 40.0),
                packet_loss_pct: Gaussian::new(0.01, 0.005),
            },
            TrafficProfile::Mmtc => Self {
                latency_ms: Gaussian::new(100.0, 30.0),
                throughput_mbps: Gaussian::new(50.0, 15.0),
                packet_loss_pct: Gaussian::new(0.5, 0.2),
            },
        }
    }
}

/// 受信電力の一様分布範囲（dBm）
pub const SIGNAL_RANGE_DBM: (f64, f64) = (-90.0, -60.0);
/// 接続UE数のポアソン平均
pub const ACTIVE_USERS_MEAN: f64 = 50.0;
/// ジッター平均の遅延に対する比率
pub const JITTER_LATENCY_RATIO: f64 = 0.1;
/// パケットロスの正常時上限（%）
pub const PACKET_LOSS_CAP_PCT: f64 = 5.0;
