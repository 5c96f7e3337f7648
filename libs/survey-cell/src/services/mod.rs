pub mod survey;

pub use survey::{map_score, SurveyService};
