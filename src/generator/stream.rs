//! 合成KPIストリーム生成器

use super::inject::InjectedAnomaly;
use super::profile::{
    ProfileParams, ACTIVE_USERS_MEAN, JITTER_LATENCY_RATIO, PACKET_LOSS_CAP_PCT, SIGNAL_RANGE_DBM,
};
use crate::error::{Error, Result};
use crate::kpi::{NetworkKpiRecord, TrafficProfile};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Exp, Normal, Poisson, Uniform};
use tracing::debug;

/// 生成対象のセル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    pub cell_id: String,
    pub traffic_profile: TrafficProfile,
}

impl CellSpec {
    pub fn new(cell_id: impl Into<String>, traffic_profile: TrafficProfile) -> Self {
        Self {
            cell_id: cell_id.into(),
            traffic_profile,
        }
    }
}

/// ストリーム生成設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub cells: Vec<CellSpec>,
    pub start: DateTime<Utc>,
    /// 計測回数（セルごと）
    pub measurements: usize,
    /// 計測間隔（秒）
    pub interval_secs: i64,
    /// 異常注入率（0.0-1.0）
    pub anomaly_rate: f64,
}

impl StreamConfig {
    /// 指定時間分の計測回数で設定を作成
    pub fn for_duration(
        cells: Vec<CellSpec>,
        start: DateTime<Utc>,
        duration_hours: f64,
        interval_secs: i64,
        anomaly_rate: f64,
    ) -> Self {
        let interval = interval_secs.max(1);
        Self {
            cells,
            start,
            measurements: ((duration_hours * 3600.0) / interval as f64) as usize,
            interval_secs: interval,
            anomaly_rate,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::for_duration(
            vec![
                CellSpec::new("gNB_001_Cell_1", TrafficProfile::Embb),
                CellSpec::new("gNB_002_Cell_1", TrafficProfile::Embb),
            ],
            Utc::now() - Duration::hours(1),
            1.0,
            10,
            0.05,
        )
    }
}

/// 正解ラベル付きレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub record: NetworkKpiRecord,
    /// 注入された異常（正常なら None）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<InjectedAnomaly>,
}

impl LabeledRecord {
    pub fn is_anomalous(&self) -> bool {
        self.anomaly.is_some()
    }
}

/// 合成KPI生成器
///
/// 同じシードからは同じ系列が生成される。
pub struct KpiGenerator {
    rng: StdRng,
}

impl KpiGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 正常時のレコードを1件生成
    pub fn baseline_record(
        &mut self,
        cell_id: &str,
        traffic_profile: TrafficProfile,
        timestamp: DateTime<Utc>,
    ) -> Result<NetworkKpiRecord> {
        let params = ProfileParams::for_profile(traffic_profile);

        let latency = self.normal(params.latency_ms.mean, params.latency_ms.std_dev)?.max(0.1);
        let throughput = self
            .normal(params.throughput_mbps.mean, params.throughput_mbps.std_dev)?
            .max(1.0);
        let packet_loss = self
            .normal(params.packet_loss_pct.mean, params.packet_loss_pct.std_dev)?
            .clamp(0.0, PACKET_LOSS_CAP_PCT);

        let jitter: f64 = Exp::new(1.0 / (latency * JITTER_LATENCY_RATIO))
            .map_err(distribution_error)?
            .sample(&mut self.rng);
        let jitter = jitter.max(0.1);
        let signal: f64 = Uniform::new(SIGNAL_RANGE_DBM.0, SIGNAL_RANGE_DBM.1)
            .map_err(distribution_error)?
            .sample(&mut self.rng);
        let users: f64 = Poisson::new(ACTIVE_USERS_MEAN)
            .map_err(distribution_error)?
            .sample(&mut self.rng);

        Ok(NetworkKpiRecord {
            timestamp,
            cell_id: cell_id.to_string(),
            traffic_profile,
            latency_ms: round_to(latency, 2),
            throughput_mbps: round_to(throughput, 2),
            packet_loss_pct: round_to(packet_loss, 4),
            jitter_ms: Some(round_to(jitter, 2)),
            signal_strength_dbm: Some(round_to(signal, 1)),
            active_users: Some(users as u32),
        })
    }

    /// 異常の種類と強度をランダムに選ぶ
    pub fn random_anomaly(&mut self) -> InjectedAnomaly {
        match self.rng.gen_range(0..3) {
            0 => InjectedAnomaly::LatencySpike {
                multiplier: self.rng.gen_range(2.5..5.0),
            },
            1 => InjectedAnomaly::ThroughputDrop {
                factor: self.rng.gen_range(0.3..0.6),
            },
            _ => InjectedAnomaly::Congestion,
        }
    }

    /// ラベル付きストリームを生成（時刻順、同時刻はセル順）
    pub fn generate_stream(&mut self, config: &StreamConfig) -> Result<Vec<LabeledRecord>> {
        if !(0.0..=1.0).contains(&config.anomaly_rate) {
            return Err(Error::InvalidConfiguration(format!(
                "anomaly_rate must be within [0, 1], got {}",
                config.anomaly_rate
            )));
        }

        let mut records = Vec::with_capacity(config.measurements * config.cells.len());
        for i in 0..config.measurements {
            let timestamp = config.start + Duration::seconds(i as i64 * config.interval_secs);
            for cell in &config.cells {
                let mut record =
                    self.baseline_record(&cell.cell_id, cell.traffic_profile, timestamp)?;
                let anomaly = if self.rng.gen::<f64>() < config.anomaly_rate {
                    let anomaly = self.random_anomaly();
                    anomaly.apply(&mut record);
                    Some(anomaly)
                } else {
                    None
                };
                records.push(LabeledRecord { record, anomaly });
            }
        }

        debug!(
            "Generated {} records ({} anomalous) for {} cells",
            records.len(),
            records.iter().filter(|r| r.is_anomalous()).count(),
            config.cells.len()
        );
        Ok(records)
    }

    fn normal(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        let value: f64 = Normal::new(mean, std_dev)
            .map_err(distribution_error)?
            .sample(&mut self.rng);
        Ok(value)
    }
}

fn distribution_error(e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("Invalid distribution parameters: {}", e))
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10_f64.powi(digits);
    (value * scale).round() / scale
}
