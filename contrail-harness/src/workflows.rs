use std::sync::Arc;

use rand::Rng;

use contrail_core::metrics::Recorder;
use contrail_core::outcome::{
    classify_cancel, classify_change_target, classify_create, Outcome,
};
use contrail_core::StoreResult;
use contrail_shared::{Flight, ReservationData};

use crate::session::Session;

/// Everything a workflow needs: the shared session and recorder, plus the
/// flight reference data loaded once at startup.
#[derive(Clone)]
pub struct ScenarioCtx {
    pub session: Arc<Session>,
    pub recorder: Arc<Recorder>,
    pub flights: Arc<Vec<Flight>>,
}

impl ScenarioCtx {
    pub fn new(session: Arc<Session>, recorder: Arc<Recorder>, flights: Arc<Vec<Flight>>) -> Self {
        Self {
            session,
            recorder,
            flights,
        }
    }

    fn random_flight(&self) -> Option<&Flight> {
        if self.flights.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.flights.len());
        Some(&self.flights[idx])
    }
}

fn record(recorder: &Recorder, outcome: Outcome, detail: impl FnOnce() -> String) {
    if outcome.is_anomaly() {
        recorder.note_anomaly(outcome, detail());
    }
    recorder.record_outcome(outcome);
}

/// Create-and-verify: pick a random flight and free seat, reserve it, then
/// re-read the seat flag and the seat's reservation list as two independent
/// reads. Read-your-write is not assumed; whatever the reads show is
/// classified and tallied. Returns the reservation only on a clean success.
pub async fn create_and_verify(
    ctx: &ScenarioCtx,
    passenger: &str,
) -> StoreResult<Option<ReservationData>> {
    let Some(flight) = ctx.random_flight() else {
        ctx.recorder.record_outcome(Outcome::SkippedNoSeats);
        return Ok(None);
    };
    let flight = flight.clone();

    let free = ctx.session.free_seats(flight.id).await?;
    if free.is_empty() {
        // Benign no-op, excluded from the anomaly tallies.
        ctx.recorder.record_outcome(Outcome::SkippedNoSeats);
        return Ok(None);
    }
    let seat = free[rand::thread_rng().gen_range(0..free.len())].clone();

    let id = ctx
        .session
        .create_reservation(passenger, flight.id, seat.seat_no)
        .await?;
    let seat_free = ctx.session.is_seat_free(flight.id, seat.seat_no).await?;
    let visible = ctx
        .session
        .reservations_for_seat(flight.id, seat.seat_no)
        .await?;

    let outcome = classify_create(seat_free, &visible, id);
    record(&ctx.recorder, outcome, || {
        format!(
            "after reserving {} on flight {}: is_free={}, {} reservation(s) visible, expected {}",
            seat.seat_no,
            flight,
            seat_free,
            visible.len(),
            id
        )
    });

    if outcome == Outcome::Success {
        Ok(Some(ReservationData {
            flight,
            reservation_id: id,
            seat,
        }))
    } else {
        Ok(None)
    }
}

/// Create-then-cancel: on a successful create, cancel it and verify the seat
/// reads empty and free again. Leaves nothing behind.
pub async fn create_and_cancel(ctx: &ScenarioCtx, passenger: &str) -> StoreResult<Vec<ReservationData>> {
    let Some(data) = create_and_verify(ctx, passenger).await? else {
        return Ok(Vec::new());
    };

    ctx.session
        .cancel_reservation(data.flight.id, data.seat.seat_no, data.reservation_id)
        .await?;
    let seat_free = ctx
        .session
        .is_seat_free(data.flight.id, data.seat.seat_no)
        .await?;
    let remaining = ctx
        .session
        .reservations_for_seat(data.flight.id, data.seat.seat_no)
        .await?;

    let outcome = classify_cancel(seat_free, &remaining);
    record(&ctx.recorder, outcome, || {
        format!(
            "after cancelling {} on flight {}: is_free={}, {} reservation(s) remain",
            data.seat.seat_no,
            data.flight,
            seat_free,
            remaining.len()
        )
    });
    Ok(Vec::new())
}

/// Create-then-change: book an old and a new seat, cancel the old one, then
/// verify the old seat is empty and the new seat still holds the new
/// reservation. Exactly one outcome is recorded for the change step, the
/// first violation found.
pub async fn create_and_change(ctx: &ScenarioCtx, passenger: &str) -> StoreResult<Vec<ReservationData>> {
    let Some(old) = create_and_verify(ctx, passenger).await? else {
        return Ok(Vec::new());
    };
    let Some(new) = create_and_verify(ctx, passenger).await? else {
        // The change fell through; the old booking stays behind for cleanup.
        return Ok(vec![old]);
    };

    ctx.session
        .cancel_reservation(old.flight.id, old.seat.seat_no, old.reservation_id)
        .await?;

    let old_free = ctx
        .session
        .is_seat_free(old.flight.id, old.seat.seat_no)
        .await?;
    let old_rows = ctx
        .session
        .reservations_for_seat(old.flight.id, old.seat.seat_no)
        .await?;
    let cancel_outcome = classify_cancel(old_free, &old_rows);

    if cancel_outcome != Outcome::Success {
        record(&ctx.recorder, cancel_outcome, || {
            format!(
                "change: old seat {} on flight {} not released: is_free={}, {} reservation(s)",
                old.seat.seat_no,
                old.flight,
                old_free,
                old_rows.len()
            )
        });
        return Ok(vec![new]);
    }

    let new_free = ctx
        .session
        .is_seat_free(new.flight.id, new.seat.seat_no)
        .await?;
    let new_rows = ctx
        .session
        .reservations_for_seat(new.flight.id, new.seat.seat_no)
        .await?;
    let outcome = classify_change_target(new_free, &new_rows);
    record(&ctx.recorder, outcome, || {
        format!(
            "change: new seat {} on flight {} lost: is_free={}, {} reservation(s)",
            new.seat.seat_no,
            new.flight,
            new_free,
            new_rows.len()
        )
    });
    Ok(vec![new])
}

/// How many random flight probes multi-booking spends looking for flights
/// with availability before giving up with a benign skip.
const MULTI_BOOKING_PROBE_BUDGET: usize = 32;

/// Atomic multi-booking: reserve a seat on 2-3 distinct flights, then
/// re-read every pair. One conflicting pair fails the whole batch: every
/// reservation just created is cancelled, modeling an all-or-nothing
/// requirement the store itself does not enforce.
pub async fn multi_booking(ctx: &ScenarioCtx, passenger: &str) -> StoreResult<Vec<ReservationData>> {
    let wanted = rand::thread_rng().gen_range(2..=3);
    let mut flights: Vec<Flight> = Vec::new();
    let mut probes = 0;
    while flights.len() < wanted && probes < MULTI_BOOKING_PROBE_BUDGET {
        probes += 1;
        let Some(candidate) = ctx.random_flight() else {
            break;
        };
        if flights.iter().any(|f| f.id == candidate.id) {
            continue;
        }
        let candidate = candidate.clone();
        if ctx.session.free_seat_count(candidate.id).await? > 0 {
            flights.push(candidate);
        }
    }
    if flights.len() < wanted {
        ctx.recorder.record_outcome(Outcome::SkippedNoSeats);
        return Ok(Vec::new());
    }

    let mut created: Vec<ReservationData> = Vec::new();
    for flight in flights {
        let free = ctx.session.free_seats(flight.id).await?;
        if free.is_empty() {
            // The seat vanished between the count and the listing; treat it
            // as a failed batch and roll back what we already booked.
            return abort_batch(ctx, created, &flight).await;
        }
        let seat = free[rand::thread_rng().gen_range(0..free.len())].clone();
        let id = ctx
            .session
            .create_reservation(passenger, flight.id, seat.seat_no)
            .await?;
        created.push(ReservationData {
            flight,
            reservation_id: id,
            seat,
        });
    }

    let mut conflicted = None;
    for data in &created {
        let rows = ctx
            .session
            .reservations_for_seat(data.flight.id, data.seat.seat_no)
            .await?;
        let foreign = rows.len() > 1 || (rows.len() == 1 && rows[0].id != data.reservation_id);
        if foreign {
            conflicted = Some(data.flight.clone());
        }
    }

    if let Some(flight) = conflicted {
        return abort_batch(ctx, created, &flight).await;
    }

    record(&ctx.recorder, Outcome::Success, String::new);
    Ok(created)
}

async fn abort_batch(
    ctx: &ScenarioCtx,
    created: Vec<ReservationData>,
    flight: &Flight,
) -> StoreResult<Vec<ReservationData>> {
    if created.is_empty() {
        // Nothing was booked yet, so there is nothing to roll back.
        ctx.recorder.record_outcome(Outcome::SkippedNoSeats);
        return Ok(Vec::new());
    }
    let booked = created.len();
    for data in created {
        ctx.session
            .cancel_reservation(data.flight.id, data.seat.seat_no, data.reservation_id)
            .await?;
    }
    record(&ctx.recorder, Outcome::AtomicAborted, || {
        format!(
            "multi-booking rolled back ({booked} reservation(s) cancelled), conflict on flight {flight}"
        )
    });
    Ok(Vec::new())
}
