//! Kindred - discovery and matching engine for the Kindred dating app
//!
//! Produces a ranked, privacy-preserving discovery feed, records swipes,
//! detects mutual likes and keeps a favorites list. Profiles only ever leave
//! the engine with a coarse geohash cell in place of raw coordinates.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{geohash, CandidateGenerator, CompatibilityScorer, ScoringParams};
pub use crate::error::{ErrorKind, MatchError, MatchResult};
pub use crate::models::{DiscoveryFilters, InteractionKind, Profile, PublicProfile, ScoredCandidate};
pub use crate::services::{ManualClock, MatchEngine, MemoryStore, SystemClock};
