pub mod clock;
pub mod locale;
pub mod phone;

pub use clock::{ClinicCalendar, Clock, FixedClock, SystemClock};
