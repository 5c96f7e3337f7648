pub mod settings;
pub mod store;

pub use settings::{AutomationSettings, SettingsReader};
pub use store::StoreClient;
