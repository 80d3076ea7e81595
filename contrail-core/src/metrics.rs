use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::outcome::Outcome;

/// Process-wide anomaly and timing recorder, explicitly constructed and
/// injected into every worker and scenario. Counters are atomics; the
/// per-scenario timing map and the anomaly log are mutex-guarded and only
/// locked for short, await-free sections. Snapshots taken concurrently with
/// ongoing increments are approximate point-in-time views, which is all the
/// monitoring surface needs.
#[derive(Default)]
pub struct Recorder {
    success: AtomicU64,
    seat_free_after_reserve: AtomicU64,
    reservation_missing: AtomicU64,
    conflicting_reservations: AtomicU64,
    cancel_not_applied: AtomicU64,
    atomic_aborted: AtomicU64,
    skipped_no_seats: AtomicU64,
    transient_retries: AtomicU64,
    timings: Mutex<HashMap<&'static str, ScenarioTiming>>,
    anomalies: Mutex<Vec<String>>,
}

#[derive(Default, Clone, Copy)]
struct ScenarioTiming {
    total: Duration,
    invocations: u64,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one classified workflow outcome. Called exactly once per
    /// classified step; benign skips land in their own counter, outside the
    /// classified sum.
    pub fn record_outcome(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &self.success,
            Outcome::SeatFreeAfterReserve => &self.seat_free_after_reserve,
            Outcome::ReservationMissing => &self.reservation_missing,
            Outcome::ConflictingReservations => &self.conflicting_reservations,
            Outcome::CancelNotApplied => &self.cancel_not_applied,
            Outcome::AtomicAborted => &self.atomic_aborted,
            Outcome::SkippedNoSeats => &self.skipped_no_seats,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Keep a human-readable trace of an anomaly for the shutdown report and
    /// surface it on the live log as it happens.
    pub fn note_anomaly(&self, outcome: Outcome, detail: String) {
        tracing::warn!(anomaly = outcome.label(), "{detail}");
        let line = format!("[{}] {}", outcome.label(), detail);
        self.lock_anomalies().push(line);
    }

    /// One transient store failure absorbed by the retry loop.
    pub fn transient_retry(&self) {
        self.transient_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duration(&self, scenario: &'static str, elapsed: Duration) {
        let mut timings = self.lock_timings();
        let entry = timings.entry(scenario).or_default();
        entry.total += elapsed;
        entry.invocations += 1;
    }

    pub fn anomaly_log(&self) -> Vec<String> {
        self.lock_anomalies().clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let scenarios = {
            let timings = self.lock_timings();
            let mut rows: Vec<ScenarioStat> = timings
                .iter()
                .map(|(name, t)| ScenarioStat {
                    name: (*name).to_string(),
                    invocations: t.invocations,
                    mean_millis: if t.invocations == 0 {
                        0.0
                    } else {
                        t.total.as_secs_f64() * 1000.0 / t.invocations as f64
                    },
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            rows
        };

        MetricsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            seat_free_after_reserve: self.seat_free_after_reserve.load(Ordering::Relaxed),
            reservation_missing: self.reservation_missing.load(Ordering::Relaxed),
            conflicting_reservations: self.conflicting_reservations.load(Ordering::Relaxed),
            cancel_not_applied: self.cancel_not_applied.load(Ordering::Relaxed),
            atomic_aborted: self.atomic_aborted.load(Ordering::Relaxed),
            skipped_no_seats: self.skipped_no_seats.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            anomaly_lines: self.lock_anomalies().len() as u64,
            scenarios,
        }
    }

    fn lock_timings(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, ScenarioTiming>> {
        self.timings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_anomalies(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.anomalies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Point-in-time view of all counters, in stable render order.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub success: u64,
    pub seat_free_after_reserve: u64,
    pub reservation_missing: u64,
    pub conflicting_reservations: u64,
    pub cancel_not_applied: u64,
    pub atomic_aborted: u64,
    pub skipped_no_seats: u64,
    pub transient_retries: u64,
    pub anomaly_lines: u64,
    pub scenarios: Vec<ScenarioStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioStat {
    pub name: String,
    pub invocations: u64,
    pub mean_millis: f64,
}

impl MetricsSnapshot {
    /// Sum of the classified outcome categories (skips excluded).
    pub fn classified_total(&self) -> u64 {
        self.success
            + self.seat_free_after_reserve
            + self.reservation_missing
            + self.conflicting_reservations
            + self.cancel_not_applied
            + self.atomic_aborted
    }

    pub fn anomaly_total(&self) -> u64 {
        self.classified_total() - self.success
    }

    /// The live status block, in stable order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== status ===");
        let _ = writeln!(out, "successful operations:        {}", self.success);
        let _ = writeln!(
            out,
            "seat free after reserve:      {}",
            self.seat_free_after_reserve
        );
        let _ = writeln!(
            out,
            "reservation missing:          {}",
            self.reservation_missing
        );
        let _ = writeln!(
            out,
            "conflicting reservations:     {}",
            self.conflicting_reservations
        );
        let _ = writeln!(
            out,
            "cancellation not applied:     {}",
            self.cancel_not_applied
        );
        let _ = writeln!(out, "multi-booking aborted:        {}", self.atomic_aborted);
        let _ = writeln!(out, "skipped (no free seats):      {}", self.skipped_no_seats);
        let _ = writeln!(out, "transient retries:            {}", self.transient_retries);
        for stat in &self.scenarios {
            let _ = writeln!(
                out,
                "scenario {:<28} {} runs, mean {:.2} ms",
                stat.name, stat.invocations, stat.mean_millis
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_sum_matches_recorded_outcomes() {
        let recorder = Recorder::new();
        recorder.record_outcome(Outcome::Success);
        recorder.record_outcome(Outcome::Success);
        recorder.record_outcome(Outcome::ConflictingReservations);
        recorder.record_outcome(Outcome::SkippedNoSeats);

        let snap = recorder.snapshot();
        assert_eq!(snap.classified_total(), 3);
        assert_eq!(snap.anomaly_total(), 1);
        assert_eq!(snap.skipped_no_seats, 1);
    }

    #[test]
    fn test_counters_are_monotonic_across_snapshots() {
        let recorder = Recorder::new();
        recorder.record_outcome(Outcome::Success);
        let first = recorder.snapshot();
        recorder.record_outcome(Outcome::CancelNotApplied);
        recorder.transient_retry();
        let second = recorder.snapshot();

        assert!(second.success >= first.success);
        assert!(second.classified_total() > first.classified_total());
        assert_eq!(second.transient_retries, 1);
    }

    #[test]
    fn test_scenario_timings_report_mean() {
        let recorder = Recorder::new();
        recorder.record_duration("single_booking", Duration::from_millis(10));
        recorder.record_duration("single_booking", Duration::from_millis(30));
        recorder.record_duration("book_and_cancel", Duration::from_millis(5));

        let snap = recorder.snapshot();
        // Sorted by name for a stable status block.
        assert_eq!(snap.scenarios[0].name, "book_and_cancel");
        assert_eq!(snap.scenarios[1].name, "single_booking");
        assert_eq!(snap.scenarios[1].invocations, 2);
        assert!((snap.scenarios[1].mean_millis - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_anomaly_log_keeps_detail_lines() {
        let recorder = Recorder::new();
        recorder.note_anomaly(
            Outcome::SeatFreeAfterReserve,
            "seat 3 on flight X reads free".to_string(),
        );
        let log = recorder.anomaly_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("seat_free_after_reserve"));
    }

    #[test]
    fn test_render_is_stable_order() {
        let recorder = Recorder::new();
        recorder.record_outcome(Outcome::Success);
        let a = recorder.snapshot().render();
        let b = recorder.snapshot().render();
        assert_eq!(a, b);
        assert!(a.starts_with("=== status ==="));
    }
}
