pub mod prelude;

pub mod media_requests;
pub mod reconcile_history;
pub mod season_records;
