//! Persistence collaborators
//!
//! The engine only talks to these traits. Uniqueness of interaction pairs,
//! match pairs and favorite pairs is enforced by the implementation and is
//! the sole concurrency guard for writes.

use crate::core::interactions::{CanonicalPair, MatchInsert};
use crate::models::{CandidateQuery, Favorite, Interaction, InteractionCounts, Match, Profile};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation on a pair key
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Connection, pool or timeout failure; the caller may retry
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to profiles and the block list
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    /// Coarse candidate pull; `excluded_ids` are dropped before `limit` applies
    /// and the engine applies the exact filters
    async fn candidate_profiles(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>>;

    /// Ids blocked by `user_id` or blocking `user_id`
    async fn blocked_user_ids(&self, user_id: &str) -> StoreResult<HashSet<String>>;
}

/// Interaction, match and favorite persistence
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Insert or overwrite the row for (actor, target)
    async fn upsert_interaction(&self, interaction: &Interaction) -> StoreResult<()>;

    async fn get_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<Interaction>>;

    /// Every target the actor has recorded any interaction against
    async fn interacted_target_ids(&self, actor_id: &str) -> StoreResult<HashSet<String>>;

    /// Insert a match unless one exists for the pair
    async fn create_match(&self, candidate: &Match) -> StoreResult<MatchInsert>;

    async fn find_match(&self, pair: &CanonicalPair) -> StoreResult<Option<Match>>;

    /// Mark the pair's match unmatched; false when there is no active match
    async fn deactivate_match(&self, pair: &CanonicalPair) -> StoreResult<bool>;

    /// Active matches of a user, newest first
    async fn list_matches(&self, user_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Match>>;

    /// Insert a favorite; true when a new row was written
    async fn add_favorite(&self, favorite: &Favorite) -> StoreResult<bool>;

    /// Delete a favorite; true when a row was removed
    async fn remove_favorite(&self, owner_id: &str, target_id: &str) -> StoreResult<bool>;

    /// Favorites of an owner, newest first
    async fn list_favorites(&self, owner_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Favorite>>;

    async fn interaction_counts(&self, user_id: &str) -> StoreResult<InteractionCounts>;

    async fn health_check(&self) -> StoreResult<bool>;
}
