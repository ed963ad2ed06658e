//! エンジン設定の型定義
//!
//! 構築時に読み込まれ、以降は読み取り専用として扱う。

use crate::error::{Error, Result};
use crate::kpi::{names, TrafficProfile};
use serde::{Deserialize, Serialize};

/// エンジン全体の設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub baseline: BaselineConfig,
    pub detectors: DetectorsConfig,
    pub aggregator: AggregatorConfig,
    pub alerts: AlertsConfig,
    pub engine: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// ベースラインウィンドウ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// 短期ウィンドウ容量
    pub short_capacity: usize,
    /// 長期ウィンドウ容量
    pub long_capacity: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            short_capacity: 20,
            long_capacity: 200,
        }
    }
}

/// 検知器ごとの設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    pub zscore: ZScoreConfig,
    pub baseline_deviation: BaselineDeviationConfig,
    pub isolation_forest: IsolationForestConfig,
    pub throughput_drop: ThroughputDropConfig,
    pub traffic_instability: TrafficInstabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreConfig {
    pub enabled: bool,
    /// |z| のしきい値
    pub threshold: f64,
    /// ウォームアップに必要な最小サンプル数
    pub min_samples: u64,
    /// 標準偏差の下限
    pub epsilon: f64,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 3.0, // 3シグマルール
            min_samples: 5,
            epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineDeviationConfig {
    pub enabled: bool,
    /// 短期平均と長期平均の相対乖離しきい値
    pub threshold: f64,
    /// 有効化に必要な長期ウィンドウ充填率
    pub min_fill_ratio: f64,
    pub epsilon: f64,
}

impl Default for BaselineDeviationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.3,
            min_fill_ratio: 0.5,
            epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    pub enabled: bool,
    /// 特徴量として結合するKPI
    pub feature_kpis: Vec<String>,
    /// タイムスタンプ整列の許容幅（ミリ秒）
    pub alignment_tolerance_ms: i64,
    /// セルごとの特徴量履歴容量
    pub history_capacity: usize,
    /// 学習に必要な最小ベクトル数
    pub min_training_samples: usize,
    /// 再学習間隔（新規ベクトル数）
    pub retrain_every: usize,
    /// ツリー数
    pub n_trees: usize,
    /// ツリーごとのサブサンプルサイズ
    pub sample_size: usize,
    /// 想定異常率
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feature_kpis: vec![
                names::LATENCY_MS.to_string(),
                names::THROUGHPUT_MBPS.to_string(),
                names::PACKET_LOSS_PCT.to_string(),
            ],
            alignment_tolerance_ms: 5_000,
            history_capacity: 512,
            min_training_samples: 64,
            retrain_every: 50,
            n_trees: 100,
            sample_size: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputDropConfig {
    pub enabled: bool,
    /// 対象KPI
    pub kpi_name: String,
    /// プロファイル下限に対する低下率しきい値
    pub drop_threshold: f64,
    /// 長期平均に対する副次マージン
    pub baseline_margin: f64,
    /// 有効化に必要な長期ウィンドウ件数
    pub min_history: usize,
    pub floors: ProfileFloors,
}

impl Default for ThroughputDropConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kpi_name: names::THROUGHPUT_MBPS.to_string(),
            drop_threshold: 0.3,
            baseline_margin: 0.2,
            min_history: 20,
            floors: ProfileFloors::default(),
        }
    }
}

/// プロファイル別の期待スループット下限（Mbps）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFloors {
    pub embb: f64,
    pub urllc: f64,
    pub mmtc: f64,
}

impl ProfileFloors {
    pub fn floor(&self, profile: TrafficProfile) -> f64 {
        match profile {
            TrafficProfile::Embb => self.embb,
            TrafficProfile::Urllc => self.urllc,
            TrafficProfile::Mmtc => self.mmtc,
        }
    }
}

impl Default for ProfileFloors {
    fn default() -> Self {
        Self {
            embb: 500.0,
            urllc: 120.0,
            mmtc: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficInstabilityConfig {
    pub enabled: bool,
    /// 変動係数のしきい値
    pub threshold: f64,
    /// 対象となるボリューム系KPI
    pub volume_kpis: Vec<String>,
    pub epsilon: f64,
}

impl Default for TrafficInstabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            volume_kpis: vec![
                names::THROUGHPUT_MBPS.to_string(),
                names::ACTIVE_USERS.to_string(),
            ],
            epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// 複数種別の検知器が一致した場合の加点
    pub corroboration_bonus: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            corroboration_bonus: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// 永続化キューの容量
    pub channel_capacity: usize,
    /// warning 以上とみなす集約スコア
    pub warning_threshold: f64,
    /// critical とみなす集約スコア
    pub critical_threshold: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            warning_threshold: 0.5,
            critical_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// バッチ処理で同時に処理するセル数（0 = CPU数）
    pub batch_parallelism: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_parallelism: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn effective_parallelism(&self) -> usize {
        if self.batch_parallelism == 0 {
            num_cpus::get().max(1)
        } else {
            self.batch_parallelism
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// ログレベル (trace, debug, info, warn, error)
    pub level: String,
    /// JSON 形式で出力
    pub json: bool,
    /// ファイル出力先（未指定ならコンソールのみ）
    pub log_dir: Option<String>,
    /// ローテーション（daily, hourly, never）
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
            rotation: "daily".to_string(),
        }
    }
}

impl EngineConfig {
    /// 設定値の整合性を検証
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Error {
            Error::InvalidConfiguration(msg.into())
        }
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(format!("{} must be > 0, got {}", name, value)))
            }
        }
        fn ratio(name: &str, value: f64) -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(invalid(format!("{} must be within [0, 1], got {}", name, value)))
            }
        }

        if self.baseline.short_capacity == 0 || self.baseline.long_capacity == 0 {
            return Err(invalid("window capacities must be > 0"));
        }
        if self.baseline.short_capacity > self.baseline.long_capacity {
            return Err(invalid("short_capacity must not exceed long_capacity"));
        }

        let d = &self.detectors;
        positive("zscore.threshold", d.zscore.threshold)?;
        positive("zscore.epsilon", d.zscore.epsilon)?;
        positive("baseline_deviation.threshold", d.baseline_deviation.threshold)?;
        ratio("baseline_deviation.min_fill_ratio", d.baseline_deviation.min_fill_ratio)?;
        ratio("throughput_drop.drop_threshold", d.throughput_drop.drop_threshold)?;
        ratio("throughput_drop.baseline_margin", d.throughput_drop.baseline_margin)?;
        for profile in TrafficProfile::ALL {
            positive(
                &format!("throughput_drop.floors.{}", profile),
                d.throughput_drop.floors.floor(profile),
            )?;
        }
        positive("traffic_instability.threshold", d.traffic_instability.threshold)?;

        let forest = &d.isolation_forest;
        if forest.enabled {
            if forest.feature_kpis.is_empty() {
                return Err(invalid("isolation_forest.feature_kpis must not be empty"));
            }
            if forest.n_trees == 0 || forest.sample_size < 2 {
                return Err(invalid("isolation_forest needs n_trees > 0 and sample_size >= 2"));
            }
            if forest.min_training_samples < 2
                || forest.min_training_samples > forest.history_capacity
            {
                return Err(invalid(
                    "isolation_forest.min_training_samples must be within [2, history_capacity]",
                ));
            }
            if forest.retrain_every == 0 {
                return Err(invalid("isolation_forest.retrain_every must be > 0"));
            }
            if !(forest.contamination > 0.0 && forest.contamination < 0.5) {
                return Err(invalid("isolation_forest.contamination must be within (0, 0.5)"));
            }
            if forest.alignment_tolerance_ms < 0 {
                return Err(invalid("isolation_forest.alignment_tolerance_ms must be >= 0"));
            }
        }

        ratio("aggregator.corroboration_bonus", self.aggregator.corroboration_bonus)?;
        if self.alerts.channel_capacity == 0 {
            return Err(invalid("alerts.channel_capacity must be > 0"));
        }
        if self.alerts.warning_threshold > self.alerts.critical_threshold {
            return Err(invalid("alerts.warning_threshold must not exceed critical_threshold"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = EngineConfig::default();
        config.baseline.short_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.detectors.zscore.threshold = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_forest_skips_forest_checks() {
        let mut config = EngineConfig::default();
        config.detectors.isolation_forest.enabled = false;
        config.detectors.isolation_forest.feature_kpis.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [detectors.zscore]
            threshold = 2.5

            [detectors.throughput_drop.floors]
            embb = 50.0
            "#,
        )
        .unwrap();

        assert_eq!(config.detectors.zscore.threshold, 2.5);
        assert_eq!(config.detectors.zscore.min_samples, 5);
        assert_eq!(config.detectors.throughput_drop.floors.embb, 50.0);
        assert_eq!(config.detectors.throughput_drop.floors.urllc, 120.0);
        assert_eq!(config.baseline.long_capacity, 200);
    }
}
