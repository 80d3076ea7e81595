use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use uuid::Uuid;

use contrail_core::metrics::Recorder;
use contrail_core::retry::RetryPolicy;
use contrail_harness::scenario::{BookAndCancel, MultiFlightBooking, Scenario};
use contrail_harness::{workflows, Driver, DriverConfig, ScenarioCtx, Session};
use contrail_shared::{Flight, Reservation};
use contrail_store::app_config::CleanupMode;
use contrail_store::MemoryStore;

fn flight(departure: &str, destination: &str) -> Flight {
    Flight {
        id: Uuid::new_v4(),
        departure: departure.into(),
        destination: destination.into(),
        date: NaiveDate::from_ymd_opt(2019, 5, 12).expect("valid date"),
        duration_minutes: 540,
        cost: 450.0,
    }
}

async fn ctx_for(store: Arc<MemoryStore>) -> (ScenarioCtx, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::new());
    let session = Arc::new(Session::new(
        store.clone(),
        recorder.clone(),
        RetryPolicy::Unbounded,
    ));
    let flights = Arc::new(session.all_flights().await.expect("flights"));
    (
        ScenarioCtx::new(session, recorder.clone(), flights),
        recorder,
    )
}

fn driver_config(workers: usize, iterations: usize, scenario: &str) -> DriverConfig {
    DriverConfig {
        workers,
        iterations,
        scenario: scenario.into(),
        status_interval: Duration::from_secs(60),
        cleanup_mode: CleanupMode::Disabled,
        cleanup_max_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_single_worker_single_seat_succeeds_once() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Warsaw", "Tokyo");
    store.seed_flight(f.clone(), 1);

    let recorder = Arc::new(Recorder::new());
    let driver = Driver::new(
        store.clone(),
        recorder.clone(),
        RetryPolicy::Unbounded,
        driver_config(1, 1, "single_booking"),
    );
    let summary = driver.run().await.expect("run");

    assert_eq!(summary.completed_iterations, 1);
    assert_eq!(summary.failed_workers, 0);
    assert_eq!(summary.snapshot.success, 1);
    assert_eq!(summary.snapshot.anomaly_total(), 0);

    // The store agrees: seat occupied, exactly one reservation on it.
    assert_eq!(store.seat_flag(f.id, 1), Some(false));
    assert_eq!(store.reservation_rows().len(), 1);
    assert_eq!(
        store.reservation_rows()[0].seat_no,
        1,
    );
}

#[tokio::test]
async fn test_two_workers_racing_for_last_seat_never_both_succeed() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Berlin", "Paris");
    store.seed_flight(f.clone(), 1);

    let recorder = Arc::new(Recorder::new());
    let driver = Driver::new(
        store.clone(),
        recorder.clone(),
        RetryPolicy::Unbounded,
        driver_config(2, 1, "single_booking"),
    );
    let summary = driver.run().await.expect("run");
    let snap = &summary.snapshot;

    // Every invocation is accounted for, and the race can resolve to one
    // success plus a skip, or to classified conflicts, but never to two
    // successes on the same seat.
    assert_eq!(summary.completed_iterations, 2);
    assert_eq!(snap.classified_total() + snap.skipped_no_seats, 2);
    assert!(snap.success <= 1, "two successes for one seat: {snap:?}");
}

#[tokio::test]
async fn test_cancel_is_left_inverse_of_create_without_contention() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Warsaw", "Berlin");
    store.seed_flight(f.clone(), 1);

    let (ctx, recorder) = ctx_for(store.clone()).await;
    let outcome = BookAndCancel
        .execute(&ctx, "Anna-0")
        .await
        .expect("scenario");

    assert!(outcome.reservations.is_empty());
    // Create and cancel each classified clean.
    assert_eq!(recorder.snapshot().success, 2);
    assert_eq!(recorder.snapshot().anomaly_total(), 0);
    assert_eq!(store.seat_flag(f.id, 1), Some(true));
    assert!(store.reservation_rows().is_empty());
}

#[tokio::test]
async fn test_create_and_verify_skips_when_no_free_seats() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Tokyo", "Warsaw");
    store.seed_flight(f.clone(), 0);

    let (ctx, recorder) = ctx_for(store).await;
    let created = workflows::create_and_verify(&ctx, "Anna-0")
        .await
        .expect("workflow");

    assert!(created.is_none());
    let snap = recorder.snapshot();
    assert_eq!(snap.skipped_no_seats, 1);
    assert_eq!(snap.classified_total(), 0);
}

#[tokio::test]
async fn test_multi_booking_rolls_back_everything_on_conflict() {
    let store = Arc::new(MemoryStore::new());
    let mut poisoned = Vec::new();
    for _ in 0..3 {
        let f = flight("Los Angeles", "Paris");
        store.seed_flight(f.clone(), 1);
        // A ghost writer already holds a reservation row on every seat while
        // the seat still reads free, so any batch the workflow books will
        // observe a conflict during verification.
        let ghost = Reservation {
            id: Uuid::new_v4(),
            flight_id: f.id,
            seat_no: 1,
            passenger: "ghost".into(),
        };
        store.seed_reservation(ghost.clone());
        poisoned.push(ghost);
    }

    let (ctx, recorder) = ctx_for(store.clone()).await;
    let outcome = MultiFlightBooking
        .execute(&ctx, "Dawid-3")
        .await
        .expect("scenario");

    // All-or-nothing: nothing of ours survives, only the ghosts remain.
    assert!(outcome.reservations.is_empty());
    let snap = recorder.snapshot();
    assert_eq!(snap.atomic_aborted, 1);
    assert_eq!(snap.success, 0);
    let rows = store.reservation_rows();
    assert!(rows.iter().all(|r| r.passenger == "ghost"));
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_multi_booking_commits_when_every_pair_is_clean() {
    let store = Arc::new(MemoryStore::new());
    for city in ["Warsaw", "Berlin", "Paris"] {
        store.seed_flight(flight(city, "Tokyo"), 4);
    }

    let (ctx, recorder) = ctx_for(store.clone()).await;
    let outcome = MultiFlightBooking
        .execute(&ctx, "Ewa-4")
        .await
        .expect("scenario");

    let snap = recorder.snapshot();
    assert_eq!(snap.success, 1);
    assert_eq!(snap.anomaly_total(), 0);
    // 2 or 3 reservations, each on a distinct flight, all still in the store.
    assert!(outcome.reservations.len() >= 2);
    assert_eq!(store.reservation_rows().len(), outcome.reservations.len());
    for data in &outcome.reservations {
        assert_eq!(store.seat_flag(data.flight.id, data.seat.seat_no), Some(false));
    }
}

#[tokio::test]
async fn test_retry_counter_reflects_injected_transient_faults() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Paris", "Warsaw");
    store.seed_flight(f.clone(), 2);
    store.inject_fault(contrail_core::StoreError::WriteTimeout);
    store.inject_fault(contrail_core::StoreError::ReadTimeout);

    let (ctx, recorder) = ctx_for(store).await;
    let created = workflows::create_and_verify(&ctx, "Filip-5")
        .await
        .expect("workflow");

    // The faults delayed the workflow but never changed its result.
    assert!(created.is_some());
    let snap = recorder.snapshot();
    assert_eq!(snap.transient_retries, 2);
    assert_eq!(snap.success, 1);
}

#[tokio::test]
async fn test_delayed_cleanup_cancels_residual_reservations() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Tokyo", "Berlin");
    store.seed_flight(f.clone(), 5);

    let recorder = Arc::new(Recorder::new());
    let mut config = driver_config(1, 3, "single_booking");
    config.cleanup_mode = CleanupMode::Delayed;
    config.cleanup_max_delay = Duration::from_millis(10);

    let driver = Driver::new(store.clone(), recorder.clone(), RetryPolicy::Unbounded, config);
    let summary = driver.run().await.expect("run");

    assert_eq!(summary.completed_iterations, 3);
    // The driver drains deferred cleanup before its final snapshot, so no
    // reservation survives the run.
    assert!(store.reservation_rows().is_empty());
    for seat_no in 1..=5 {
        assert_eq!(store.seat_flag(f.id, seat_no), Some(true));
    }
}

#[tokio::test]
async fn test_random_mix_run_accounts_for_every_invocation() {
    let store = Arc::new(MemoryStore::new());
    for city in ["Warsaw", "Tokyo", "Berlin", "Paris"] {
        store.seed_flight(flight(city, "Los Angeles"), 20);
    }

    let recorder = Arc::new(Recorder::new());
    let mut config = driver_config(4, 25, "random");
    config.cleanup_mode = CleanupMode::Immediate;
    let driver = Driver::new(
        store.clone(),
        recorder.clone(),
        RetryPolicy::Unbounded,
        config,
    );
    let summary = driver.run().await.expect("run");
    let snap = &summary.snapshot;

    assert_eq!(summary.completed_iterations, 100);
    assert_eq!(summary.failed_workers, 0);
    // Compound scenarios classify more than one step per invocation, so the
    // classified total can exceed the iteration count but never undershoots
    // it once skips are added back in.
    assert!(snap.classified_total() + snap.skipped_no_seats >= 100);
    // Timing rows are filed under the delegates' names, never under
    // "random".
    assert!(snap.scenarios.iter().all(|s| s.name != "random"));
    assert!(!snap.scenarios.is_empty());
    let timed: u64 = snap.scenarios.iter().map(|s| s.invocations).sum();
    assert_eq!(timed, 100);
}

#[tokio::test]
async fn test_fatal_store_error_kills_worker_but_not_the_run() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Berlin", "Tokyo");
    store.seed_flight(f.clone(), 10);
    // Let the driver's startup flight load through, then fail the worker's
    // first operation fatally.
    store.inject_pass(1);
    store.inject_fault(contrail_core::StoreError::Query("schema dropped".into()));

    let recorder = Arc::new(Recorder::new());
    let driver = Driver::new(
        store.clone(),
        recorder.clone(),
        RetryPolicy::Unbounded,
        driver_config(1, 5, "single_booking"),
    );
    let summary = driver.run().await.expect("run");

    assert_eq!(summary.failed_workers, 1);
    assert!(summary.completed_iterations < 5);
}

#[tokio::test]
async fn test_unknown_scenario_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    store.seed_flight(flight("Warsaw", "Paris"), 1);

    let recorder = Arc::new(Recorder::new());
    let driver = Driver::new(
        store,
        recorder,
        RetryPolicy::Unbounded,
        driver_config(1, 1, "no_such_scenario"),
    );
    assert!(driver.run().await.is_err());
}

#[tokio::test]
async fn test_anomaly_counters_only_grow() {
    let store = Arc::new(MemoryStore::new());
    let f = flight("Paris", "Berlin");
    store.seed_flight(f.clone(), 3);

    let (ctx, recorder) = ctx_for(store.clone()).await;
    let _ = workflows::create_and_verify(&ctx, "Anna-0").await.expect("workflow");
    let first = recorder.snapshot();
    let _ = workflows::create_and_cancel(&ctx, "Anna-0").await.expect("workflow");
    let second = recorder.snapshot();

    assert!(second.classified_total() >= first.classified_total());
    assert!(second.success >= first.success);
    assert!(second.anomaly_total() >= first.anomaly_total());
    assert_eq!(
        second.classified_total(),
        second.success + second.anomaly_total()
    );
}
