//! Spanish date and time rendering for patient-facing message variables.

use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;

const WEEKDAYS: [&str; 7] = [
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
    "domingo",
];

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// "martes 14 de mayo"
pub fn spanish_date(at: DateTime<Tz>) -> String {
    let weekday = WEEKDAYS[at.weekday().num_days_from_monday() as usize];
    let month = MONTHS[at.month0() as usize];
    format!("{} {} de {}", weekday, at.day(), month)
}

/// "10:30 hs"
pub fn spanish_time(at: DateTime<Tz>) -> String {
    format!("{:02}:{:02} hs", at.hour(), at.minute())
}
