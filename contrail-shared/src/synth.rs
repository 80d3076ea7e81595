//! Synthetic input used to generate load: a fixed pool of cities, flight
//! dates and passenger names, with uniform random pickers. Pickers use the
//! thread-local RNG so concurrent workers never share mutable RNG state.

use chrono::NaiveDate;
use rand::Rng;

pub const CITIES: [&str; 5] = ["Warsaw", "Tokyo", "Los Angeles", "Berlin", "Paris"];

pub const PASSENGER_NAMES: [&str; 6] = ["Anna", "Borys", "Celina", "Dawid", "Ewa", "Filip"];

pub fn flight_dates() -> Vec<NaiveDate> {
    [(2019, 5, 12), (2019, 6, 6)]
        .iter()
        .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
}

pub fn random_city() -> &'static str {
    CITIES[rand::thread_rng().gen_range(0..CITIES.len())]
}

pub fn random_date() -> NaiveDate {
    let dates = flight_dates();
    dates[rand::thread_rng().gen_range(0..dates.len())]
}

/// Stable per-worker passenger name, e.g. "Celina-2".
pub fn passenger_name(worker: usize) -> String {
    format!("{}-{}", PASSENGER_NAMES[worker % PASSENGER_NAMES.len()], worker)
}
