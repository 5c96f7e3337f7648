pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::SurveyError;
pub use handlers::SurveyCellState;
pub use models::*;
pub use router::*;
pub use services::SurveyService;
