//! SQLite アラートストア
//!
//! sqlx を使用した非同期クエリ実行とコネクションプーリング。

use super::record::{AlertLevel, AlertRecord};
use super::store::{AlertCounts, AlertQuery, AlertSink, AlertStore};
use crate::detectors::AnomalyKind;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

/// SQLite アラートストア
pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    /// 接続してスキーマを初期化
    ///
    /// # Arguments
    /// * `database_url` - 接続URL (例: "sqlite://alerts.db?mode=rwc", "sqlite::memory:")
    /// * `max_connections` - 最大接続数
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// マイグレーションを実行
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                cell_id TEXT NOT NULL,
                kpi_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                aggregate_severity REAL NOT NULL,
                level TEXT NOT NULL,
                kinds TEXT NOT NULL,
                value REAL NOT NULL,
                message TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_cell ON alerts(cell_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn from_row(row: &SqliteRow) -> Result<AlertRecord> {
        let id: String = row.try_get("id")?;
        let level: String = row.try_get("level")?;
        let kinds: String = row.try_get("kinds")?;
        let timestamp: DateTime<Utc> = row.try_get("timestamp")?;

        Ok(AlertRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| Error::Storage(format!("Invalid alert id {}: {}", id, e)))?,
            cell_id: row.try_get("cell_id")?,
            kpi_name: row.try_get("kpi_name")?,
            timestamp,
            aggregate_severity: row.try_get("aggregate_severity")?,
            level: level.parse::<AlertLevel>().map_err(Error::Storage)?,
            kinds: serde_json::from_str::<Vec<AnomalyKind>>(&kinds)?,
            value: row.try_get("value")?,
            message: row.try_get("message")?,
            acknowledged: row.try_get("acknowledged")?,
        })
    }
}

#[async_trait]
impl AlertSink for SqliteAlertStore {
    async fn store(&self, alert: AlertRecord) -> Result<()> {
        let kinds = serde_json::to_string(&alert.kinds)?;

        sqlx::query(
            r#"
            INSERT INTO alerts (id, cell_id, kpi_name, timestamp, aggregate_severity, level, kinds, value, message, acknowledged)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.id.to_string())
        .bind(&alert.cell_id)
        .bind(&alert.kpi_name)
        .bind(alert.timestamp)
        .bind(alert.aggregate_severity)
        .bind(alert.level.as_str())
        .bind(&kinds)
        .bind(alert.value)
        .bind(&alert.message)
        .bind(alert.acknowledged)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, cell_id, kpi_name, timestamp, aggregate_severity, level, kinds, value, message, acknowledged FROM alerts WHERE 1 = 1",
        );
        if let Some(cell_id) = &query.cell_id {
            builder.push(" AND cell_id = ").push_bind(cell_id.clone());
        }
        if let Some(level) = query.level {
            builder.push(" AND level = ").push_bind(level.as_str());
        }
        if let Some(acknowledged) = query.acknowledged {
            builder.push(" AND acknowledged = ").push_bind(acknowledged);
        }
        builder
            .push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(query.limit as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn acknowledge(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn counts(&self) -> Result<AlertCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN acknowledged = 0 THEN 1 ELSE 0 END), 0) AS pending FROM alerts",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let pending: i64 = row.try_get("pending")?;
        Ok(AlertCounts {
            total: total as u64,
            unacknowledged: pending as u64,
        })
    }
}
