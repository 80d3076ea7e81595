use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{error, info, warn};

use contrail_core::metrics::{MetricsSnapshot, Recorder};
use contrail_core::retry::RetryPolicy;
use contrail_core::store::ReservationStore;
use contrail_shared::synth;
use contrail_store::app_config::CleanupMode;

use crate::scenario::{resolve, Scenario};
use crate::session::Session;
use crate::workflows::ScenarioCtx;
use crate::HarnessError;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub workers: usize,
    pub iterations: usize,
    /// Scenario name from the registry, or "random".
    pub scenario: String,
    pub status_interval: Duration,
    pub cleanup_mode: CleanupMode,
    pub cleanup_max_delay: Duration,
}

#[derive(Debug)]
pub struct RunSummary {
    pub completed_iterations: u64,
    /// Workers that died on a fatal store error before finishing their
    /// iteration budget.
    pub failed_workers: usize,
    pub snapshot: MetricsSnapshot,
}

/// Spins up N workers x M iterations of "pick scenario, execute, record"
/// over one shared store connection and one recorder, with a periodic
/// status reporter on the side.
pub struct Driver {
    store: Arc<dyn ReservationStore>,
    recorder: Arc<Recorder>,
    retry: RetryPolicy,
    config: DriverConfig,
}

impl Driver {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        recorder: Arc<Recorder>,
        retry: RetryPolicy,
        config: DriverConfig,
    ) -> Self {
        Self {
            store,
            recorder,
            retry,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, HarnessError> {
        let scenario = resolve(&self.config.scenario)
            .ok_or_else(|| HarnessError::UnknownScenario(self.config.scenario.clone()))?;

        let session = Arc::new(Session::new(
            self.store.clone(),
            self.recorder.clone(),
            self.retry.clone(),
        ));
        let flights = Arc::new(session.all_flights().await?);
        if flights.is_empty() {
            return Err(HarnessError::NoFlights);
        }
        info!(
            flights = flights.len(),
            workers = self.config.workers,
            iterations = self.config.iterations,
            scenario = %self.config.scenario,
            "starting workload"
        );

        let ctx = ScenarioCtx::new(session, self.recorder.clone(), flights);

        let (stop_tx, stop_rx) = watch::channel(false);
        let reporter = tokio::spawn(report_loop(
            self.recorder.clone(),
            self.config.status_interval,
            stop_rx,
        ));

        let cleanup_tasks: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(self.config.workers);
        for w in 0..self.config.workers {
            workers.push(tokio::spawn(worker_loop(
                w,
                self.config.iterations,
                scenario.clone(),
                ctx.clone(),
                self.config.cleanup_mode,
                self.config.cleanup_max_delay,
                cleanup_tasks.clone(),
            )));
        }

        let mut completed_iterations = 0u64;
        let mut failed_workers = 0usize;
        for handle in workers {
            match handle.await {
                Ok((completed, failed)) => {
                    completed_iterations += completed;
                    if failed {
                        failed_workers += 1;
                    }
                }
                Err(e) => {
                    error!(error = %e, "worker task panicked");
                    failed_workers += 1;
                }
            }
        }

        // Let deferred cleanup finish before the final snapshot so its
        // retries and failures are on the report.
        let pending = std::mem::take(&mut *cleanup_tasks.lock().await);
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "cleanup task panicked");
            }
        }

        // Cooperative stop: the reporter prints one final snapshot on its
        // way out.
        let _ = stop_tx.send(true);
        let _ = reporter.await;

        Ok(RunSummary {
            completed_iterations,
            failed_workers,
            snapshot: self.recorder.snapshot(),
        })
    }
}

async fn worker_loop(
    worker: usize,
    iterations: usize,
    scenario: Arc<dyn Scenario>,
    ctx: ScenarioCtx,
    cleanup_mode: CleanupMode,
    cleanup_max_delay: Duration,
    cleanup_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
) -> (u64, bool) {
    let passenger = synth::passenger_name(worker);
    let mut completed = 0u64;
    for _ in 0..iterations {
        let started = Instant::now();
        match scenario.execute(&ctx, &passenger).await {
            Ok(outcome) => {
                ctx.recorder.record_duration(outcome.name, started.elapsed());
                completed += 1;
                apply_cleanup(
                    &ctx,
                    outcome.reservations,
                    cleanup_mode,
                    cleanup_max_delay,
                    &cleanup_tasks,
                )
                .await;
            }
            Err(e) => {
                // Only non-transient store errors cross the workflow
                // boundary; the worker dies and the shortfall shows up in
                // the final iteration count.
                error!(worker, error = %e, "worker aborted on fatal store error");
                return (completed, true);
            }
        }
    }
    (completed, false)
}

async fn apply_cleanup(
    ctx: &ScenarioCtx,
    reservations: Vec<contrail_shared::ReservationData>,
    mode: CleanupMode,
    max_delay: Duration,
    cleanup_tasks: &Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    if reservations.is_empty() {
        return;
    }
    match mode {
        CleanupMode::Disabled => {}
        CleanupMode::Immediate => {
            cancel_all(ctx.session.clone(), reservations).await;
        }
        CleanupMode::Delayed => {
            let delay_ms = rand::thread_rng().gen_range(0..=max_delay.as_millis() as u64);
            let session = ctx.session.clone();
            let handle = tokio::spawn(async move {
                sleep(Duration::from_millis(delay_ms)).await;
                cancel_all(session, reservations).await;
            });
            cleanup_tasks.lock().await.push(handle);
        }
    }
}

async fn cancel_all(session: Arc<Session>, reservations: Vec<contrail_shared::ReservationData>) {
    for data in reservations {
        if let Err(e) = session
            .cancel_reservation(data.flight.id, data.seat.seat_no, data.reservation_id)
            .await
        {
            warn!(error = %e, reservation = %data.reservation_id, "cleanup cancel failed");
        }
    }
}

async fn report_loop(recorder: Arc<Recorder>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("\n{}", recorder.snapshot().render());
            }
            _ = stop.changed() => break,
        }
    }
    // One last snapshot after the workers have joined.
    info!("\n{}", recorder.snapshot().render());
}
