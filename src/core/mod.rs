// Core algorithm exports
pub mod discovery;
pub mod filters;
pub mod geohash;
pub mod interactions;
pub mod pagination;
pub mod scoring;

pub use discovery::{CandidateGenerator, RankedPool};
pub use filters::{is_eligible, matches_filters, matches_preferences};
pub use interactions::{CanonicalPair, MatchInsert};
pub use pagination::{DiscoveryCursor, RankKey};
pub use scoring::{CompatibilityScorer, ScoreBreakdown, ScoringParams};
