use async_trait::async_trait;
use contrail_shared::{Flight, FlightId, Reservation, ReservationId, Seat, SeatNo};

use crate::StoreResult;

/// Backend contract for the reservation store. The harness only requires this
/// small operation set; what storage technology implements it is a deployment
/// concern. Each method is logically a single round trip. No implementation
/// may span a client-side transaction over several calls, because the
/// anomalies under test arise precisely from that non-atomicity.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn all_flights(&self) -> StoreResult<Vec<Flight>>;

    async fn flights_by_day_and_departure(
        &self,
        date: chrono::NaiveDate,
        departure: &str,
    ) -> StoreResult<Vec<Flight>>;

    /// `None` when the seat row does not exist.
    async fn seat_is_free(&self, flight: FlightId, seat: SeatNo) -> StoreResult<Option<bool>>;

    async fn free_seats(&self, flight: FlightId) -> StoreResult<Vec<Seat>>;

    async fn free_seat_count(&self, flight: FlightId) -> StoreResult<i64>;

    async fn all_reservations(&self) -> StoreResult<Vec<Reservation>>;

    async fn reservations_for_flight(&self, flight: FlightId) -> StoreResult<Vec<Reservation>>;

    async fn reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<Vec<Reservation>>;

    async fn insert_reservation(&self, reservation: &Reservation) -> StoreResult<()>;

    /// No-op when the reservation row does not exist.
    async fn update_reservation_passenger(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
        passenger: &str,
    ) -> StoreResult<()>;

    async fn delete_reservation(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
    ) -> StoreResult<()>;

    async fn delete_reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<()>;

    async fn set_seat_free(&self, flight: FlightId, seat: SeatNo, free: bool) -> StoreResult<()>;
}
