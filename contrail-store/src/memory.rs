use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use contrail_core::store::ReservationStore;
use contrail_core::{StoreError, StoreResult};
use contrail_shared::{Flight, FlightId, Reservation, ReservationId, Seat, SeatNo};

/// In-memory reservation store used by tests and local dry runs. Behaves as a
/// linearizable single node; consistency anomalies are provoked in tests by
/// seeding state directly rather than by replication lag. Failures can be
/// scripted through `inject_fault`: each queued error is returned by exactly
/// one subsequent operation, in order, before that operation touches any
/// state; `inject_pass` queues slots that let an operation through, so a
/// fault can be aimed past earlier calls.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    flights: Vec<Flight>,
    seats: HashMap<(FlightId, SeatNo), bool>,
    reservations: Vec<Reservation>,
    faults: VecDeque<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Out-of-band provisioning: a flight with `seats` free seats, numbered
    /// from 1.
    pub fn seed_flight(&self, flight: Flight, seats: u32) {
        let mut inner = self.lock();
        for seat_no in 1..=seats as SeatNo {
            inner.seats.insert((flight.id, seat_no), true);
        }
        inner.flights.push(flight);
    }

    /// Plant a reservation row directly, bypassing the booking workflow.
    /// Tests use this to fake a conflicting writer or replication ghost.
    pub fn seed_reservation(&self, reservation: Reservation) {
        self.lock().reservations.push(reservation);
    }

    pub fn inject_fault(&self, error: StoreError) {
        self.lock().faults.push_back(Some(error));
    }

    /// Queue `ops` operations that succeed before the next queued fault
    /// fires.
    pub fn inject_pass(&self, ops: usize) {
        let mut inner = self.lock();
        for _ in 0..ops {
            inner.faults.push_back(None);
        }
    }

    /// Current reservation rows, for test assertions.
    pub fn reservation_rows(&self) -> Vec<Reservation> {
        self.lock().reservations.clone()
    }

    /// Current `is_free` flag of a seat, for test assertions.
    pub fn seat_flag(&self, flight: FlightId, seat: SeatNo) -> Option<bool> {
        self.lock().seats.get(&(flight, seat)).copied()
    }

    fn take_fault(inner: &mut Inner) -> Option<StoreError> {
        inner.faults.pop_front().flatten()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn all_flights(&self) -> StoreResult<Vec<Flight>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner.flights.clone())
    }

    async fn flights_by_day_and_departure(
        &self,
        date: NaiveDate,
        departure: &str,
    ) -> StoreResult<Vec<Flight>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner
            .flights
            .iter()
            .filter(|f| f.date == date && f.departure == departure)
            .cloned()
            .collect())
    }

    async fn seat_is_free(&self, flight: FlightId, seat: SeatNo) -> StoreResult<Option<bool>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner.seats.get(&(flight, seat)).copied())
    }

    async fn free_seats(&self, flight: FlightId) -> StoreResult<Vec<Seat>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        let mut seats: Vec<Seat> = inner
            .seats
            .iter()
            .filter(|((f, _), free)| *f == flight && **free)
            .map(|((f, n), _)| Seat {
                flight_id: *f,
                seat_no: *n,
                is_free: true,
            })
            .collect();
        seats.sort_by_key(|s| s.seat_no);
        Ok(seats)
    }

    async fn free_seat_count(&self, flight: FlightId) -> StoreResult<i64> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner
            .seats
            .iter()
            .filter(|((f, _), free)| *f == flight && **free)
            .count() as i64)
    }

    async fn all_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner.reservations.clone())
    }

    async fn reservations_for_flight(&self, flight: FlightId) -> StoreResult<Vec<Reservation>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner
            .reservations
            .iter()
            .filter(|r| r.flight_id == flight)
            .cloned()
            .collect())
    }

    async fn reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<Vec<Reservation>> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        Ok(inner
            .reservations
            .iter()
            .filter(|r| r.flight_id == flight && r.seat_no == seat)
            .cloned()
            .collect())
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        inner.reservations.push(reservation.clone());
        Ok(())
    }

    async fn update_reservation_passenger(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
        passenger: &str,
    ) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        if let Some(row) = inner
            .reservations
            .iter_mut()
            .find(|r| r.flight_id == flight && r.seat_no == seat && r.id == id)
        {
            row.passenger = passenger.to_string();
        }
        Ok(())
    }

    async fn delete_reservation(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
    ) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        inner
            .reservations
            .retain(|r| !(r.flight_id == flight && r.seat_no == seat && r.id == id));
        Ok(())
    }

    async fn delete_reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        inner
            .reservations
            .retain(|r| !(r.flight_id == flight && r.seat_no == seat));
        Ok(())
    }

    async fn set_seat_free(&self, flight: FlightId, seat: SeatNo, free: bool) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = Self::take_fault(&mut inner) {
            return Err(fault);
        }
        if let Some(flag) = inner.seats.get_mut(&(flight, seat)) {
            *flag = free;
        }
        Ok(())
    }
}
