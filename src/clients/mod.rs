pub mod fixture;
pub mod provider;

pub use fixture::{FixtureCandidate, FixtureProvider, FixtureSearch};
pub use provider::{
    FilterKind, ProviderError, RetryPolicy, RetryingProvider, SearchFilter, SearchProvider,
    SearchQuery,
};
