use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use contrail_core::metrics::Recorder;
use contrail_core::retry::RetryPolicy;
use contrail_core::store::ReservationStore;
use contrail_core::{StoreError, StoreResult};
use contrail_shared::{Flight, FlightId, Reservation, ReservationId, Seat, SeatNo};

/// The retrying data-access layer. Every primitive re-issues the identical
/// store operation while the failure is transient, tallying each absorbed
/// failure on the recorder; any other failure propagates immediately.
///
/// Retried writes are NOT idempotent: a create or delete re-sent after an
/// ambiguous timeout may double-apply. Callers must treat that as a known
/// risk of the store under test, not a guarantee of this layer.
///
/// Compound operations (create, cancel) are sequences of independent round
/// trips with no client-side transaction, so concurrent callers interleave
/// arbitrarily. That is the behavior under test.
pub struct Session {
    store: Arc<dyn ReservationStore>,
    recorder: Arc<Recorder>,
    retry: RetryPolicy,
}

impl Session {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        recorder: Arc<Recorder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            recorder,
            retry,
        }
    }

    async fn retrying<T, F, Fut>(&self, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    failures += 1;
                    self.recorder.transient_retry();
                    debug!(error = %e, failures, "transient store failure, retrying");
                    if !self.retry.should_retry(failures) {
                        return Err(e);
                    }
                    if let Some(delay) = self.retry.delay(failures) {
                        sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn all_flights(&self) -> StoreResult<Vec<Flight>> {
        self.retrying(|| self.store.all_flights()).await
    }

    pub async fn flights_by_day_and_departure(
        &self,
        date: chrono::NaiveDate,
        departure: &str,
    ) -> StoreResult<Vec<Flight>> {
        self.retrying(|| self.store.flights_by_day_and_departure(date, departure))
            .await
    }

    /// A missing seat row is a provisioning defect, surfaced as a fatal
    /// error rather than a classified outcome.
    pub async fn is_seat_free(&self, flight: FlightId, seat: SeatNo) -> StoreResult<bool> {
        let flag = self.retrying(|| self.store.seat_is_free(flight, seat)).await?;
        flag.ok_or_else(|| {
            StoreError::MissingRow(format!("no seat row for flight {flight} seat {seat}"))
        })
    }

    pub async fn free_seats(&self, flight: FlightId) -> StoreResult<Vec<Seat>> {
        self.retrying(|| self.store.free_seats(flight)).await
    }

    pub async fn free_seat_count(&self, flight: FlightId) -> StoreResult<i64> {
        self.retrying(|| self.store.free_seat_count(flight)).await
    }

    pub async fn reservations_for_flight(&self, flight: FlightId) -> StoreResult<Vec<Reservation>> {
        self.retrying(|| self.store.reservations_for_flight(flight))
            .await
    }

    pub async fn reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<Vec<Reservation>> {
        self.retrying(|| self.store.reservations_for_seat(flight, seat))
            .await
    }

    /// Mark the seat occupied, then insert the reservation row under a
    /// client-generated id. Two round trips, not atomic.
    pub async fn create_reservation(
        &self,
        passenger: &str,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<ReservationId> {
        let id = Uuid::new_v4();
        self.retrying(|| self.store.set_seat_free(flight, seat, false))
            .await?;
        let row = Reservation {
            id,
            flight_id: flight,
            seat_no: seat,
            passenger: passenger.to_string(),
        };
        self.retrying(|| self.store.insert_reservation(&row)).await?;
        Ok(id)
    }

    pub async fn update_reservation_passenger(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
        passenger: &str,
    ) -> StoreResult<()> {
        self.retrying(|| {
            self.store
                .update_reservation_passenger(flight, seat, id, passenger)
        })
        .await
    }

    /// Cancel one reservation. The seat is only flipped back to free when
    /// this reservation is the sole one visible; a redundant reservation on
    /// a contended seat leaves the flag alone because the seat is still
    /// taken by the other writer.
    pub async fn cancel_reservation(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
    ) -> StoreResult<()> {
        let existing = self
            .retrying(|| self.store.reservations_for_seat(flight, seat))
            .await?;
        if existing.len() == 1 {
            self.retrying(|| self.store.set_seat_free(flight, seat, true))
                .await?;
        }
        self.retrying(|| self.store.delete_reservation(flight, seat, id))
            .await
    }

    /// Cancel everything on the seat and free it, whatever state it is in.
    pub async fn cancel_all_reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<()> {
        self.retrying(|| self.store.set_seat_free(flight, seat, true))
            .await?;
        self.retrying(|| self.store.delete_reservations_for_seat(flight, seat))
            .await
    }
}
