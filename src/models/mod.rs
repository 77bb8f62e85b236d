pub mod candidate;
pub mod request;
pub mod season;
pub mod summary;

pub use candidate::{BadgeKind, CacheState, Candidate, PackBadge};
pub use request::{HistoryEntry, RequestRecord, RequestStatus};
pub use season::{CompletionMethod, SeasonError, SeasonRecord, SeasonStatus};
pub use summary::{ShowStatus, ShowSummary};
