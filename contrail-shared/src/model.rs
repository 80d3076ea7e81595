use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{FlightId, ReservationId, SeatNo};

/// Immutable flight reference data, provisioned out-of-band and loaded once
/// at harness start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub departure: String,
    pub destination: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub cost: f32,
}

impl fmt::Display for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} on {} ({})",
            self.departure, self.destination, self.date, self.id
        )
    }
}

/// One seat on a flight. The `is_free` flag is the store's
/// authoritative-but-eventually-consistent view of occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub flight_id: FlightId,
    pub seat_no: SeatNo,
    pub is_free: bool,
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seat {} (flight {}, free: {})",
            self.seat_no, self.flight_id, self.is_free
        )
    }
}

/// A booked seat. At most one reservation should exist per (flight, seat)
/// at any instant; probing violations of that is the harness's whole job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub flight_id: FlightId,
    pub seat_no: SeatNo,
    pub passenger: String,
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reservation {} (flight {}, seat {}, passenger '{}')",
            self.id, self.flight_id, self.seat_no, self.passenger
        )
    }
}

/// Workflow-local record of a reservation a scenario created, kept so later
/// cancel/change steps and deferred cleanup know what to undo. Owned by the
/// task that created it, never shared.
#[derive(Debug, Clone)]
pub struct ReservationData {
    pub flight: Flight,
    pub reservation_id: ReservationId,
    pub seat: Seat,
}
