pub mod cascade;
pub use cascade::{CascadeController, CascadeSettings, SeasonReport, SeasonTarget, Strategy};

pub mod reconcile;
pub use reconcile::{
    CancellationFlag, CancellationSignal, Coordinator, Outcome, ReconcileError, ReconcileReport,
};

pub mod store;
pub use store::{StateStore, StoreError};

pub mod tracker;
pub use tracker::{SeasonTracker, TrackerError};
