pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::AutomationError;
pub use handlers::AutomationCellState;
pub use models::*;
pub use router::*;
pub use services::{InboundProcessor, QuickReplyService};
