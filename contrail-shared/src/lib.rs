pub mod model;
pub mod synth;

pub use model::{Flight, Reservation, ReservationData, Seat};

pub type FlightId = uuid::Uuid;
pub type ReservationId = uuid::Uuid;
pub type SeatNo = i32;
