//! アラートの永続化インターフェースとインメモリ実装

use super::record::{AlertLevel, AlertRecord};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// アラートの書き込み先
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// アラートを保存
    async fn store(&self, alert: AlertRecord) -> Result<()>;
}

/// アラート検索条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    pub cell_id: Option<String>,
    pub level: Option<AlertLevel>,
    pub acknowledged: Option<bool>,
    /// 最大件数
    pub limit: usize,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            cell_id: None,
            level: None,
            acknowledged: None,
            limit: 100,
        }
    }
}

impl AlertQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, cell_id: impl Into<String>) -> Self {
        self.cell_id = Some(cell_id.into());
        self
    }

    pub fn with_level(mut self, level: AlertLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = Some(acknowledged);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// 条件に一致するか
    pub fn matches(&self, alert: &AlertRecord) -> bool {
        self.cell_id.as_ref().map_or(true, |c| *c == alert.cell_id)
            && self.level.map_or(true, |l| l == alert.level)
            && self.acknowledged.map_or(true, |a| a == alert.acknowledged)
    }
}

/// アラート件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub total: u64,
    pub unacknowledged: u64,
}

/// 検索・確認操作を備えたアラートストア
#[async_trait]
pub trait AlertStore: AlertSink {
    /// 新しい順に検索
    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>>;

    /// アラートを確認済みにする（存在しなければ false）
    async fn acknowledge(&self, id: Uuid) -> Result<bool>;

    async fn counts(&self) -> Result<AlertCounts>;
}

/// インメモリのアラートストア
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    alerts: RwLock<Vec<AlertRecord>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 確認済みアラートをクリア
    pub async fn clear_acknowledged(&self) -> usize {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| !a.acknowledged);
        before - alerts.len()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertStore {
    async fn store(&self, alert: AlertRecord) -> Result<()> {
        self.alerts.write().await.push(alert);
        Ok(())
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>> {
        let alerts = self.alerts.read().await;
        let mut matched: Vec<AlertRecord> =
            alerts.iter().filter(|a| query.matches(a)).cloned().collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(query.limit);
        Ok(matched)
    }

    async fn acknowledge(&self, id: Uuid) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledge();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn counts(&self) -> Result<AlertCounts> {
        let alerts = self.alerts.read().await;
        Ok(AlertCounts {
            total: alerts.len() as u64,
            unacknowledged: alerts.iter().filter(|a| !a.acknowledged).count() as u64,
        })
    }
}
