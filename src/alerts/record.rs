//! Alert Types

use crate::aggregator::AnomalyEvent;
use crate::config::AlertsConfig;
use crate::detectors::AnomalyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// アラートレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// 情報
    Info,
    /// 警告
    Warning,
    /// 致命的
    Critical,
}

impl AlertLevel {
    /// 統合重大度からレベルを決定
    pub fn classify(severity: f64, warning_threshold: f64, critical_threshold: f64) -> Self {
        if severity >= critical_threshold {
            Self::Critical
        } else if severity >= warning_threshold {
            Self::Warning
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown alert level: {}", other)),
        }
    }
}

/// 永続化されるアラート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// アラートID
    pub id: Uuid,
    pub cell_id: String,
    pub kpi_name: String,
    /// 計測時刻
    pub timestamp: DateTime<Utc>,
    pub aggregate_severity: f64,
    /// レベル
    pub level: AlertLevel,
    /// 検知した種別（優先順）
    pub kinds: Vec<AnomalyKind>,
    /// 計測値
    pub value: f64,
    /// メッセージ
    pub message: String,
    /// 確認済みフラグ
    pub acknowledged: bool,
}

impl AlertRecord {
    /// 異常イベントからアラートを作成（正常イベントなら None）
    pub fn from_event(event: &AnomalyEvent, config: &AlertsConfig) -> Option<Self> {
        if !event.is_anomalous {
            return None;
        }

        let sample = &event.sample;
        let kinds = event.kinds();
        let level = AlertLevel::classify(
            event.aggregate_severity,
            config.warning_threshold,
            config.critical_threshold,
        );
        let detected = kinds
            .iter()
            .map(AnomalyKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!(
            "{} anomaly on {}: {} = {:.3} (severity {:.2}, detected by {})",
            sample.traffic_profile,
            sample.cell_id,
            sample.kpi_name,
            sample.value,
            event.aggregate_severity,
            detected
        );

        Some(Self {
            id: Uuid::new_v4(),
            cell_id: sample.cell_id.clone(),
            kpi_name: sample.kpi_name.clone(),
            timestamp: sample.timestamp,
            aggregate_severity: event.aggregate_severity,
            level,
            kinds,
            value: sample.value,
            message,
            acknowledged: false,
        })
    }

    /// アラートを確認
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }
}
