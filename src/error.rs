//! Error types for the anomaly detection engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Alert storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Model training error
    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    /// Rejected input sample
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// サンプル入力の検証エラー
///
/// バッチ内の他のサンプルには影響しない（サンプル単位で呼び出し元に返す）。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// 必須フィールドの欠落・形式不正
    #[error("Malformed sample: {0}")]
    Malformed(String),

    /// NaN / 無限大
    #[error("Non-finite value for {kpi_name}: {value}")]
    NonFinite { kpi_name: String, value: f64 },

    /// 物理的にあり得ない値
    #[error("Implausible value for {kpi_name}: {value} (expected {min}..={max})")]
    Implausible {
        kpi_name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// 同一キーの直前サンプルより古いタイムスタンプ
    #[error("Out-of-order sample for {cell_id}/{kpi_name}: {timestamp} < {last_seen}")]
    OutOfOrder {
        cell_id: String,
        kpi_name: String,
        timestamp: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
}

/// 個別検知器の失敗
///
/// オーケストレーターはこれを「候補なし」として扱い、パイプラインは継続する。
#[derive(Debug, Clone, Error)]
pub enum DetectorError {
    /// 特徴量次元の不一致
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 内部状態の取得失敗
    #[error("Detector state unavailable: {0}")]
    StateUnavailable(String),
}

/// Isolation Forest の再学習エラー
///
/// 直前のモデルはそのまま使用され続ける。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    /// 学習データ不足
    #[error("Insufficient training data: got {got}, need {need}")]
    InsufficientData { got: usize, need: usize },

    /// 全特徴量が定数など、分割不能なデータ
    #[error("Degenerate training data: {0}")]
    Degenerate(String),

    /// 新しい再学習に置き換えられた
    #[error("Training superseded by a newer request")]
    Cancelled,

    /// 学習タスクの異常終了
    #[error("Training task failed: {0}")]
    TaskFailed(String),
}
