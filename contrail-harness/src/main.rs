use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contrail_core::metrics::Recorder;
use contrail_core::retry::RetryPolicy;
use contrail_harness::{report, Driver, DriverConfig};
use contrail_store::app_config::Config;
use contrail_store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contrail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        schema = %config.store.schema,
        workers = config.workload.workers,
        iterations = config.workload.iterations,
        scenario = %config.workload.scenario,
        "starting consistency harness"
    );

    let store = PostgresStore::connect(&config.store.url, &config.store.schema).await?;
    let recorder = Arc::new(Recorder::new());

    let driver = Driver::new(
        Arc::new(store),
        recorder.clone(),
        RetryPolicy::Unbounded,
        DriverConfig {
            workers: config.workload.workers,
            iterations: config.workload.iterations,
            scenario: config.workload.scenario.clone(),
            status_interval: Duration::from_secs(config.workload.status_interval_secs),
            cleanup_mode: config.cleanup.mode,
            cleanup_max_delay: Duration::from_secs(config.cleanup.max_delay_secs),
        },
    );

    let summary = driver.run().await?;
    tracing::info!(
        completed = summary.completed_iterations,
        failed_workers = summary.failed_workers,
        anomalies = summary.snapshot.anomaly_total(),
        "workload finished"
    );

    report::write_report(
        Path::new(&config.report.path),
        &summary.snapshot,
        &recorder.anomaly_log(),
    )?;
    tracing::info!(path = %config.report.path, "report written");

    Ok(())
}
