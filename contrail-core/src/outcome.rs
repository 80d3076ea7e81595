use contrail_shared::{Reservation, ReservationId};
use serde::Serialize;

/// The closed set of classified workflow outcomes. Every non-skipped workflow
/// step produces exactly one of these; anomalies are values here, never
/// errors, because they describe the store's behavior rather than a failure
/// of the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    /// The post-write reads matched the single-reservation-per-seat invariant.
    Success,
    /// Seat still visible as free despite an active reservation
    /// (visibility-lag or lost-write).
    SeatFreeAfterReserve,
    /// Reservation not visible where exactly one was expected
    /// (lost-read / ghost-write).
    ReservationMissing,
    /// More than one reservation on the seat (conflicting writers).
    ConflictingReservations,
    /// A cancellation did not remove the reservation.
    CancelNotApplied,
    /// A multi-flight booking could not be fully committed and was rolled
    /// back by the workflow.
    AtomicAborted,
    /// Benign no-op: no free seats at selection time. Excluded from the
    /// anomaly tallies.
    SkippedNoSeats,
}

impl Outcome {
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Outcome::Success | Outcome::SkippedNoSeats)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::SeatFreeAfterReserve => "seat_free_after_reserve",
            Outcome::ReservationMissing => "reservation_missing",
            Outcome::ConflictingReservations => "conflicting_reservations",
            Outcome::CancelNotApplied => "cancel_not_applied",
            Outcome::AtomicAborted => "atomic_aborted",
            Outcome::SkippedNoSeats => "skipped_no_seats",
        }
    }
}

/// Classify the two independent reads taken right after a create. The reads
/// immediately follow the write but are not guaranteed to observe it.
pub fn classify_create(
    seat_free: bool,
    reservations: &[Reservation],
    expected: ReservationId,
) -> Outcome {
    if seat_free {
        return Outcome::SeatFreeAfterReserve;
    }
    match reservations {
        [only] if only.id == expected => Outcome::Success,
        [_] | [] => Outcome::ReservationMissing,
        _ => Outcome::ConflictingReservations,
    }
}

/// Classify the reads taken right after a cancel: the seat must read free
/// again and no reservation may remain.
pub fn classify_cancel(seat_free: bool, reservations: &[Reservation]) -> Outcome {
    if !seat_free || !reservations.is_empty() {
        Outcome::CancelNotApplied
    } else {
        Outcome::Success
    }
}

/// Classify the target seat of a change: it must still read occupied and
/// show at least the reservation this workflow created.
pub fn classify_change_target(seat_free: bool, reservations: &[Reservation]) -> Outcome {
    if seat_free || reservations.is_empty() {
        Outcome::ReservationMissing
    } else {
        Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn reservation(id: ReservationId) -> Reservation {
        Reservation {
            id,
            flight_id: Uuid::new_v4(),
            seat_no: 7,
            passenger: "Ewa-4".into(),
        }
    }

    #[test]
    fn test_create_success_requires_occupied_seat_and_matching_id() {
        let id = Uuid::new_v4();
        let outcome = classify_create(false, &[reservation(id)], id);
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn test_create_seat_still_free_wins_over_other_observations() {
        let id = Uuid::new_v4();
        // Even with a matching reservation visible, a free seat flag is the
        // visibility-lag anomaly.
        let outcome = classify_create(true, &[reservation(id)], id);
        assert_eq!(outcome, Outcome::SeatFreeAfterReserve);
    }

    #[test]
    fn test_create_missing_reservation() {
        let id = Uuid::new_v4();
        assert_eq!(classify_create(false, &[], id), Outcome::ReservationMissing);
        assert_eq!(
            classify_create(false, &[reservation(Uuid::new_v4())], id),
            Outcome::ReservationMissing
        );
    }

    #[test]
    fn test_create_conflicting_writers() {
        let id = Uuid::new_v4();
        let rows = [reservation(id), reservation(Uuid::new_v4())];
        assert_eq!(
            classify_create(false, &rows, id),
            Outcome::ConflictingReservations
        );
    }

    #[test]
    fn test_cancel_classification() {
        assert_eq!(classify_cancel(true, &[]), Outcome::Success);
        assert_eq!(classify_cancel(false, &[]), Outcome::CancelNotApplied);
        assert_eq!(
            classify_cancel(true, &[reservation(Uuid::new_v4())]),
            Outcome::CancelNotApplied
        );
    }

    #[test]
    fn test_change_target_classification() {
        let row = reservation(Uuid::new_v4());
        assert_eq!(classify_change_target(false, &[row]), Outcome::Success);
        assert_eq!(
            classify_change_target(true, &[]),
            Outcome::ReservationMissing
        );
        assert_eq!(
            classify_change_target(false, &[]),
            Outcome::ReservationMissing
        );
    }

    #[test]
    fn test_skip_is_not_an_anomaly() {
        assert!(!Outcome::Success.is_anomaly());
        assert!(!Outcome::SkippedNoSeats.is_anomaly());
        assert!(Outcome::SeatFreeAfterReserve.is_anomaly());
        assert!(Outcome::AtomicAborted.is_anomaly());
    }
}
