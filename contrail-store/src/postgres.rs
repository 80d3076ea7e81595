use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

use contrail_core::store::ReservationStore;
use contrail_core::{StoreError, StoreResult};
use contrail_shared::{Flight, FlightId, Reservation, ReservationId, Seat, SeatNo};

/// Postgres-backed reservation store. Tables live under a configurable
/// schema; every method is one runtime-bound query, one round trip.
pub struct PostgresStore {
    pool: PgPool,
    schema: String,
}

impl PostgresStore {
    pub async fn connect(url: &str, schema: &str) -> StoreResult<Self> {
        if !is_valid_schema_name(schema) {
            return Err(StoreError::Query(format!(
                "invalid schema name '{schema}'"
            )));
        }
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        info!(schema, "connected to reservation store");
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }
}

/// Only identifier-safe schema names; everything else would need quoting we
/// never do in the query templates.
fn is_valid_schema_name(schema: &str) -> bool {
    !schema.is_empty()
        && schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !schema.starts_with(|c: char| c.is_ascii_digit())
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(io) => StoreError::ConnectionLost(io.to_string()),
        sqlx::Error::PoolTimedOut => StoreError::OperationTimeout,
        sqlx::Error::PoolClosed => StoreError::ConnectionLost("pool closed".into()),
        sqlx::Error::WorkerCrashed => StoreError::ConnectionLost("connection worker crashed".into()),
        sqlx::Error::Database(db) => StoreError::Query(db.to_string()),
        sqlx::Error::RowNotFound => StoreError::MissingRow("row not found".into()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn map_decode(e: sqlx::Error) -> StoreError {
    StoreError::MissingRow(e.to_string())
}

fn flight_from_row(row: &PgRow) -> StoreResult<Flight> {
    Ok(Flight {
        id: row.try_get("id").map_err(map_decode)?,
        departure: row.try_get("departure").map_err(map_decode)?,
        destination: row.try_get("destination").map_err(map_decode)?,
        date: row.try_get("date").map_err(map_decode)?,
        duration_minutes: row.try_get("duration_minutes").map_err(map_decode)?,
        cost: row.try_get("cost").map_err(map_decode)?,
    })
}

fn seat_from_row(row: &PgRow) -> StoreResult<Seat> {
    Ok(Seat {
        flight_id: row.try_get("flight_id").map_err(map_decode)?,
        seat_no: row.try_get("seat_no").map_err(map_decode)?,
        is_free: row.try_get("is_free").map_err(map_decode)?,
    })
}

fn reservation_from_row(row: &PgRow) -> StoreResult<Reservation> {
    Ok(Reservation {
        id: row.try_get("id").map_err(map_decode)?,
        flight_id: row.try_get("flight_id").map_err(map_decode)?,
        seat_no: row.try_get("seat_no").map_err(map_decode)?,
        passenger: row.try_get("passenger").map_err(map_decode)?,
    })
}

#[async_trait]
impl ReservationStore for PostgresStore {
    async fn all_flights(&self) -> StoreResult<Vec<Flight>> {
        let sql = format!(
            "SELECT id, departure, destination, date, duration_minutes, cost FROM {}",
            self.table("flights")
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(flight_from_row).collect()
    }

    async fn flights_by_day_and_departure(
        &self,
        date: NaiveDate,
        departure: &str,
    ) -> StoreResult<Vec<Flight>> {
        let sql = format!(
            "SELECT id, departure, destination, date, duration_minutes, cost \
             FROM {} WHERE departure = $1 AND date = $2",
            self.table("flights")
        );
        let rows = sqlx::query(&sql)
            .bind(departure)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(flight_from_row).collect()
    }

    async fn seat_is_free(&self, flight: FlightId, seat: SeatNo) -> StoreResult<Option<bool>> {
        let sql = format!(
            "SELECT is_free FROM {} WHERE flight_id = $1 AND seat_no = $2",
            self.table("seats")
        );
        let row = sqlx::query(&sql)
            .bind(flight)
            .bind(seat)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        match row {
            Some(row) => Ok(Some(row.try_get("is_free").map_err(map_decode)?)),
            None => Ok(None),
        }
    }

    async fn free_seats(&self, flight: FlightId) -> StoreResult<Vec<Seat>> {
        let sql = format!(
            "SELECT flight_id, seat_no, is_free FROM {} \
             WHERE flight_id = $1 AND is_free = TRUE ORDER BY seat_no",
            self.table("seats")
        );
        let rows = sqlx::query(&sql)
            .bind(flight)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(seat_from_row).collect()
    }

    async fn free_seat_count(&self, flight: FlightId) -> StoreResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) AS free_count FROM {} WHERE flight_id = $1 AND is_free = TRUE",
            self.table("seats")
        );
        let row = sqlx::query(&sql)
            .bind(flight)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.try_get("free_count").map_err(map_decode)
    }

    async fn all_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT id, flight_id, seat_no, passenger FROM {}",
            self.table("reservations")
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservations_for_flight(&self, flight: FlightId) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT id, flight_id, seat_no, passenger FROM {} WHERE flight_id = $1",
            self.table("reservations")
        );
        let rows = sqlx::query(&sql)
            .bind(flight)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT id, flight_id, seat_no, passenger FROM {} \
             WHERE flight_id = $1 AND seat_no = $2",
            self.table("reservations")
        );
        let rows = sqlx::query(&sql)
            .bind(flight)
            .bind(seat)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, flight_id, seat_no, passenger) VALUES ($1, $2, $3, $4)",
            self.table("reservations")
        );
        sqlx::query(&sql)
            .bind(reservation.id)
            .bind(reservation.flight_id)
            .bind(reservation.seat_no)
            .bind(&reservation.passenger)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_reservation_passenger(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
        passenger: &str,
    ) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET passenger = $1 WHERE flight_id = $2 AND seat_no = $3 AND id = $4",
            self.table("reservations")
        );
        sqlx::query(&sql)
            .bind(passenger)
            .bind(flight)
            .bind(seat)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_reservation(
        &self,
        flight: FlightId,
        seat: SeatNo,
        id: ReservationId,
    ) -> StoreResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE flight_id = $1 AND seat_no = $2 AND id = $3",
            self.table("reservations")
        );
        sqlx::query(&sql)
            .bind(flight)
            .bind(seat)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_reservations_for_seat(
        &self,
        flight: FlightId,
        seat: SeatNo,
    ) -> StoreResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE flight_id = $1 AND seat_no = $2",
            self.table("reservations")
        );
        sqlx::query(&sql)
            .bind(flight)
            .bind(seat)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn set_seat_free(&self, flight: FlightId, seat: SeatNo, free: bool) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET is_free = $1 WHERE flight_id = $2 AND seat_no = $3",
            self.table("seats")
        );
        sqlx::query(&sql)
            .bind(free)
            .bind(flight)
            .bind(seat)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
