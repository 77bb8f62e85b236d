pub use super::media_requests::Entity as MediaRequests;
pub use super::reconcile_history::Entity as ReconcileHistory;
pub use super::season_records::Entity as SeasonRecords;
