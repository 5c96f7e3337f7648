pub mod dispatcher;
pub mod eligibility;

pub use dispatcher::ReminderService;
pub use eligibility::scan_window;
