pub mod state;
pub mod store;

pub use state::{AppState, CachedResponse, ResponseCache};
pub use store::{ApplyOutcome, DashboardSnapshot, DashboardStore};
