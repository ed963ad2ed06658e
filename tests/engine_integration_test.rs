//! 異常検知エンジンの統合テスト

use cellpulse::alerts::{AlertQuery, AlertStore, InMemoryAlertStore};
use cellpulse::kpi::{names, SeriesKey};
use cellpulse::{
    AlertLevel, AnomalyEngine, AnomalyKind, EngineConfig, KpiSample, NetworkKpiRecord,
    TrafficProfile,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn record(cell: &str, secs: i64, latency: f64, throughput: f64, loss: f64) -> NetworkKpiRecord {
    NetworkKpiRecord {
        timestamp: at(secs),
        cell_id: cell.to_string(),
        traffic_profile: TrafficProfile::Embb,
        latency_ms: latency,
        throughput_mbps: throughput,
        packet_loss_pct: loss,
        jitter_ms: None,
        signal_strength_dbm: None,
        active_users: None,
    }
}

/// 決定的な正常値（小さな周期的ゆらぎ）
fn normal_record(cell: &str, tick: i64) -> NetworkKpiRecord {
    let wobble = ((tick * 7) % 11) as f64 / 10.0;
    record(
        cell,
        tick * 10,
        20.0 + wobble,
        800.0 + wobble * 20.0,
        0.1 + wobble / 100.0,
    )
}

fn without_forest() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.detectors.isolation_forest.enabled = false;
    config
}

#[tokio::test]
async fn test_isolation_forest_end_to_end() {
    let mut config = EngineConfig::default();
    config.detectors.isolation_forest.min_training_samples = 32;
    config.detectors.isolation_forest.retrain_every = 1000;
    config.detectors.isolation_forest.n_trees = 50;
    let engine = AnomalyEngine::new(config).unwrap();

    for tick in 0..100 {
        for result in engine.process_record(&normal_record("cell-1", tick)).await {
            result.unwrap();
        }
    }

    let info = engine.retrain_cell("cell-1").await.unwrap();
    assert!(info.training_samples >= 32);
    assert!(engine.model_info("cell-1").is_some());

    let results = engine
        .process_record(&record("cell-1", 1000 * 10, 400.0, 5.0, 4.5))
        .await;
    let flagged_by_forest = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .any(|e| e.kinds().contains(&AnomalyKind::IsolationForest));
    assert!(flagged_by_forest);

    // 別セルにはモデルがない
    assert!(engine.model_info("cell-2").is_none());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_builds_full_feature_history() {
    let mut config = EngineConfig::default();
    config.detectors.isolation_forest.min_training_samples = 2;
    config.detectors.isolation_forest.retrain_every = 10_000;
    config.detectors.isolation_forest.n_trees = 20;
    let engine = AnomalyEngine::new(config).unwrap();

    // 2セル分の300ティックを1バッチで投入
    let samples: Vec<KpiSample> = (0..300)
        .flat_map(|tick| {
            let mut samples = normal_record("cell-1", tick).into_samples();
            samples.extend(normal_record("cell-2", tick).into_samples());
            samples
        })
        .collect();
    let results = engine.process_batch(samples).await;
    assert!(results.iter().all(|r| r.is_ok()));

    for cell in ["cell-1", "cell-2"] {
        let info = engine.retrain_cell(cell).await.unwrap();
        assert_eq!(info.training_samples, 300);
    }
    engine.shutdown().await;
}

#[tokio::test]
async fn test_throughput_drop_end_to_end() {
    let engine = AnomalyEngine::new(without_forest()).unwrap();
    for tick in 0..40 {
        engine.process_record(&normal_record("cell-1", tick)).await;
    }

    let drop = KpiSample::new(
        "cell-1",
        TrafficProfile::Embb,
        at(400),
        names::THROUGHPUT_MBPS,
        150.0,
    );
    let event = engine.process(drop).await.unwrap();
    assert!(event.is_anomalous);
    assert!(event.kinds().contains(&AnomalyKind::ThroughputDrop));
}

#[tokio::test]
async fn test_replay_on_fresh_engines_is_identical() {
    let samples: Vec<KpiSample> = (0..150)
        .flat_map(|tick| {
            let mut r = normal_record("cell-1", tick);
            if tick % 37 == 36 {
                r.latency_ms *= 4.0;
            }
            r.into_samples()
        })
        .collect();

    let first = AnomalyEngine::new(without_forest()).unwrap();
    let second = AnomalyEngine::new(without_forest()).unwrap();
    let a = first.process_batch(samples.clone()).await;
    let b = second.process_batch(samples).await;

    assert_eq!(a, b);
    assert!(a.iter().filter_map(|r| r.as_ref().ok()).any(|e| e.is_anomalous));
}

#[tokio::test]
async fn test_invalid_samples_do_not_affect_batch() {
    let engine = AnomalyEngine::new(without_forest()).unwrap();
    let mut samples = normal_record("cell-1", 0).into_samples();
    samples.insert(
        1,
        KpiSample::new("cell-1", TrafficProfile::Embb, at(0), names::PACKET_LOSS_PCT, 250.0),
    );
    samples.push(KpiSample::new(
        "cell-1",
        TrafficProfile::Embb,
        at(0),
        names::SIGNAL_STRENGTH_DBM,
        f64::NAN,
    ));

    let results = engine.process_batch(samples).await;
    assert_eq!(results.len(), 5);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    assert!(results[3].is_ok());
    assert!(results[4].is_err());

    let stats = engine.stats().await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.rejected, 2);
}

#[tokio::test]
async fn test_concurrent_cells_share_engine() {
    let engine = AnomalyEngine::new(without_forest()).unwrap();
    let mut handles = Vec::new();
    for cell in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let cell_id = format!("cell-{}", cell);
            for tick in 0..50 {
                for result in engine.process_record(&normal_record(&cell_id, tick)).await {
                    result.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = engine.stats().await;
    assert_eq!(stats.processed, 8 * 50 * 3);
    assert_eq!(stats.tracked_series, 8 * 3);

    let state = engine
        .baseline(&SeriesKey::new("cell-3", names::LATENCY_MS))
        .await
        .unwrap();
    assert_eq!(state.count, 50);
}

#[tokio::test]
async fn test_alerts_persisted_with_levels() {
    let store = Arc::new(InMemoryAlertStore::new());
    let engine = AnomalyEngine::with_sink(without_forest(), store.clone()).unwrap();
    for tick in 0..60 {
        engine.process_record(&normal_record("cell-1", tick)).await;
    }
    engine
        .process_record(&record("cell-1", 600, 300.0, 810.0, 0.1))
        .await;
    engine.shutdown().await;

    let alerts = store
        .list(&AlertQuery::new().with_cell("cell-1"))
        .await
        .unwrap();
    assert!(!alerts.is_empty());
    let latency = alerts
        .iter()
        .find(|a| a.kpi_name == names::LATENCY_MS)
        .unwrap();
    assert_eq!(latency.value, 300.0);
    assert_eq!(latency.level, AlertLevel::Critical);
    assert!(latency.kinds.contains(&AnomalyKind::Zscore));

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.total as usize, alerts.len());
    assert_eq!(counts.unacknowledged, counts.total);
}

#[tokio::test]
async fn test_reset_series_restarts_baseline() {
    let engine = AnomalyEngine::new(without_forest()).unwrap();
    for tick in 0..10 {
        engine.process_record(&normal_record("cell-1", tick)).await;
    }
    let key = SeriesKey::new("cell-1", names::LATENCY_MS);
    assert!(engine.reset_series(&key).await);
    assert!(engine.baseline(&key).await.is_none());

    // リセット後は古い時刻も受け付ける
    let sample = KpiSample::new("cell-1", TrafficProfile::Embb, at(0), names::LATENCY_MS, 20.0);
    assert!(engine.process(sample).await.is_ok());
    assert_eq!(engine.baseline(&key).await.unwrap().count, 1);
}
