//! # cellpulse
//!
//! Command-line interface for the 5G KPI anomaly detection engine.

use anyhow::{Context, Result};
use cellpulse::alerts::{AlertCounts, AlertQuery, AlertStore, InMemoryAlertStore};
use cellpulse::generator::{evaluate, CellSpec, EvaluationReport, KpiGenerator, StreamConfig};
use cellpulse::kpi::{summarize, KpiBatch, NetworkKpiRecord};
use cellpulse::logging::{init_logging, LogConfig};
use cellpulse::{AnomalyEngine, AnomalyEvent, ConfigLoader, EngineConfig, EngineStats, TrafficProfile};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cellpulse")]
#[command(about = "Multi-algorithm anomaly detection for 5G cell KPIs", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CELLPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a labelled synthetic stream, run detection and score it
    Simulate {
        /// Number of cells
        #[arg(long, default_value = "2")]
        cells: usize,

        /// Traffic profile (embb, urllc, mmtc)
        #[arg(short, long, default_value = "embb")]
        profile: TrafficProfile,

        /// Simulated duration in hours
        #[arg(long, default_value = "1.0")]
        hours: f64,

        /// Measurement interval in seconds
        #[arg(long, default_value = "10")]
        interval: i64,

        /// Fraction of records with an injected anomaly
        #[arg(long, default_value = "0.05")]
        anomaly_rate: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write anomalous events as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run detection over a JSON KPI batch
    Detect {
        /// Input file (`{"kpis": [...], "source": "..."}`)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only emit anomalous events
        #[arg(long)]
        anomalies_only: bool,
    },

    /// Print per-(cell, KPI) statistics of a JSON KPI batch
    Summarize {
        /// Input file (`{"kpis": [...], "source": "..."}`)
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct SimulationReport {
    records: usize,
    injected: usize,
    evaluation: EvaluationReport,
    engine: EngineStats,
    alerts: AlertCounts,
}

#[derive(Serialize)]
#[serde(untagged)]
enum DetectOutput {
    Event(AnomalyEvent),
    Rejected { rejected: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .load_from_file(cli.config.clone())
        .load_from_env()
        .build()
        .context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let log_config = LogConfig::from_logging_config(&config.logging)?;
    let _guard = init_logging(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Simulate {
            cells,
            profile,
            hours,
            interval,
            anomaly_rate,
            seed,
            output,
        } => {
            let cells = (1..=cells.max(1))
                .map(|i| CellSpec::new(format!("gNB_{:03}_Cell_1", i), profile))
                .collect();
            let stream = StreamConfig::for_duration(
                cells,
                Utc::now() - Duration::seconds((hours * 3600.0) as i64),
                hours,
                interval,
                anomaly_rate,
            );
            simulate(config, stream, seed, output.as_deref()).await
        }
        Commands::Detect {
            input,
            output,
            anomalies_only,
        } => detect(config, &input, output.as_deref(), anomalies_only).await,
        Commands::Summarize { input } => {
            let batch = read_batch(&input)?;
            println!("{}", serde_json::to_string_pretty(&summarize(&batch.samples()))?);
            Ok(())
        }
    }
}

async fn simulate(
    config: EngineConfig,
    stream: StreamConfig,
    seed: u64,
    output: Option<&Path>,
) -> Result<()> {
    let records = KpiGenerator::new(seed)
        .generate_stream(&stream)
        .context("Failed to generate synthetic stream")?;
    info!(
        "Generated {} records for {} cells (seed {})",
        records.len(),
        stream.cells.len(),
        seed
    );

    let store = Arc::new(InMemoryAlertStore::new());
    let engine = AnomalyEngine::with_sink(config, store.clone())?;

    // 同時刻のレコードはまとめて1バッチ
    let mut events = Vec::new();
    for tick in records.chunk_by(|a, b| a.record.timestamp == b.record.timestamp) {
        let samples = tick.iter().flat_map(|r| r.record.into_samples()).collect();
        for result in engine.process_batch(samples).await {
            match result {
                Ok(event) => events.push(event),
                Err(e) => warn!("Sample rejected: {}", e),
            }
        }
    }
    engine.shutdown().await;

    let report = SimulationReport {
        records: records.len(),
        injected: records.iter().filter(|r| r.is_anomalous()).count(),
        evaluation: evaluate(&records, &events),
        engine: engine.stats().await,
        alerts: store.counts().await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = output {
        let anomalous: Vec<&AnomalyEvent> = events.iter().filter(|e| e.is_anomalous).collect();
        fs::write(path, serde_json::to_string_pretty(&anomalous)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} anomalous events to {}", anomalous.len(), path.display());
    }

    let critical = store
        .list(&AlertQuery::new().with_level(cellpulse::AlertLevel::Critical).with_limit(5))
        .await?;
    for alert in critical {
        info!("{}", alert.message);
    }

    Ok(())
}

async fn detect(
    config: EngineConfig,
    input: &Path,
    output: Option<&Path>,
    anomalies_only: bool,
) -> Result<()> {
    let batch = read_batch(input)?;
    info!(
        "Loaded {} records from {} (source: {})",
        batch.kpis.len(),
        input.display(),
        batch.source
    );

    let mut records: Vec<NetworkKpiRecord> = batch.kpis;
    records.sort_by_key(|r| r.timestamp);

    let engine = AnomalyEngine::new(config)?;
    let samples = records.iter().flat_map(|r| r.into_samples()).collect();
    let outputs: Vec<DetectOutput> = engine
        .process_batch(samples)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(event) if anomalies_only && !event.is_anomalous => None,
            Ok(event) => Some(DetectOutput::Event(event)),
            Err(e) => Some(DetectOutput::Rejected {
                rejected: e.to_string(),
            }),
        })
        .collect();
    engine.shutdown().await;

    let json = serde_json::to_string_pretty(&outputs)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    let stats = engine.stats().await;
    info!(
        "Processed {} samples: {} anomalous, {} rejected",
        stats.processed, stats.anomalous, stats.rejected
    );
    Ok(())
}

fn read_batch(path: &Path) -> Result<KpiBatch> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid KPI batch in {}", path.display()))
}
