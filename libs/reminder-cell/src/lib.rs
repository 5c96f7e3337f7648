pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::ReminderError;
pub use handlers::ReminderCellState;
pub use models::*;
pub use router::*;
pub use services::ReminderService;
