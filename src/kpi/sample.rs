//! KPIサンプル型定義

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// 標準KPI名
pub mod names {
    pub const LATENCY_MS: &str = "latency_ms";
    pub const THROUGHPUT_MBPS: &str = "throughput_mbps";
    pub const PACKET_LOSS_PCT: &str = "packet_loss_pct";
    pub const JITTER_MS: &str = "jitter_ms";
    pub const SIGNAL_STRENGTH_DBM: &str = "signal_strength_dbm";
    pub const ACTIVE_USERS: &str = "active_users";
}

/// 5Gトラフィックプロファイル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficProfile {
    /// Enhanced Mobile Broadband
    #[serde(rename = "eMBB", alias = "embb")]
    Embb,
    /// Ultra-Reliable Low-Latency Communications
    #[serde(rename = "URLLC", alias = "urllc")]
    Urllc,
    /// Massive Machine-Type Communications
    #[serde(rename = "mMTC", alias = "mmtc")]
    Mmtc,
}

impl TrafficProfile {
    /// 全プロファイル
    pub const ALL: [TrafficProfile; 3] = [Self::Embb, Self::Urllc, Self::Mmtc];

    /// 表示名を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embb => "eMBB",
            Self::Urllc => "URLLC",
            Self::Mmtc => "mMTC",
        }
    }
}

impl fmt::Display for TrafficProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrafficProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embb" => Ok(Self::Embb),
            "urllc" => Ok(Self::Urllc),
            "mmtc" => Ok(Self::Mmtc),
            other => Err(format!("unknown traffic profile: {}", other)),
        }
    }
}

/// 単一KPIの計測値
///
/// 生成後は不変。エンジンは読み取り専用で扱う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KpiSample {
    /// gNodeB セル識別子
    #[validate(length(min = 1, max = 128))]
    pub cell_id: String,
    /// トラフィックプロファイル
    pub traffic_profile: TrafficProfile,
    /// 計測時刻
    pub timestamp: DateTime<Utc>,
    /// KPI名（例: throughput_mbps）
    #[validate(length(min = 1, max = 64))]
    pub kpi_name: String,
    /// 計測値
    pub value: f64,
}

impl KpiSample {
    /// 新しいサンプルを作成
    pub fn new(
        cell_id: impl Into<String>,
        traffic_profile: TrafficProfile,
        timestamp: DateTime<Utc>,
        kpi_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            cell_id: cell_id.into(),
            traffic_profile,
            timestamp,
            kpi_name: kpi_name.into(),
            value,
        }
    }

    /// ベースライン追跡キー
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.cell_id, &self.kpi_name)
    }

    /// 入力検証（形式・有限性・物理的妥当範囲）
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        if !self.value.is_finite() {
            return Err(ValidationError::NonFinite {
                kpi_name: self.kpi_name.clone(),
                value: self.value,
            });
        }

        if let Some((min, max)) = plausible_range(&self.kpi_name) {
            if self.value < min || self.value > max {
                return Err(ValidationError::Implausible {
                    kpi_name: self.kpi_name.clone(),
                    value: self.value,
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

/// 既知KPIの物理的妥当範囲。未知のKPIは有限値であれば受け付ける。
pub fn plausible_range(kpi_name: &str) -> Option<(f64, f64)> {
    match kpi_name {
        names::LATENCY_MS => Some((0.0, 60_000.0)),
        names::THROUGHPUT_MBPS => Some((0.0, 100_000.0)),
        names::PACKET_LOSS_PCT => Some((0.0, 100.0)),
        names::JITTER_MS => Some((0.0, 60_000.0)),
        names::SIGNAL_STRENGTH_DBM => Some((-150.0, 0.0)),
        names::ACTIVE_USERS => Some((0.0, 1_000_000.0)),
        _ => None,
    }
}

/// (cell_id, kpi_name) の系列キー
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub cell_id: String,
    pub kpi_name: String,
}

impl SeriesKey {
    pub fn new(cell_id: impl Into<String>, kpi_name: impl Into<String>) -> Self {
        Self {
            cell_id: cell_id.into(),
            kpi_name: kpi_name.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cell_id, self.kpi_name)
    }
}
