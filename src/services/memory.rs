use crate::core::interactions::{CanonicalPair, MatchInsert};
use crate::models::{
    CandidateQuery, Favorite, Interaction, InteractionCounts, InteractionKind, Match, MatchState, Profile,
};
use crate::services::store::{InteractionStore, ProfileStore, StoreResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;

/// In-process store for tests and single-node development
///
/// Pair uniqueness comes from the DashMap entry API, which locks the key's
/// shard for the duration of each insert.
#[derive(Default)]
pub struct MemoryStore {
    profiles: DashMap<String, Profile>,
    blocks: DashSet<(String, String)>,
    interactions: DashMap<(String, String), Interaction>,
    matches: DashMap<CanonicalPair, Match>,
    favorites: DashMap<(String, String), Favorite>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile
    pub fn put_profile(&self, profile: Profile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn block(&self, blocker_id: &str, blocked_id: &str) {
        self.blocks.insert((blocker_id.to_string(), blocked_id.to_string()));
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn candidate_profiles(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        let mut candidates: Vec<Profile> = self
            .profiles
            .iter()
            .filter(|p| p.user_id != query.requester_id && p.is_discoverable())
            .filter(|p| !query.excluded_ids.contains(&p.user_id))
            .filter(|p| query.genders.is_empty() || query.genders.contains(&p.gender))
            .filter(|p| match &query.geohash_prefix {
                Some(prefix) => p.geohash().is_some_and(|h| h.to_lowercase().starts_with(prefix.as_str())),
                None => true,
            })
            .map(|p| p.clone())
            .collect();

        // Most recently updated first, like the SQL store
        candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.user_id.cmp(&b.user_id)));
        candidates.truncate(query.limit);

        Ok(candidates)
    }

    async fn blocked_user_ids(&self, user_id: &str) -> StoreResult<HashSet<String>> {
        Ok(self
            .blocks
            .iter()
            .filter_map(|pair| {
                let (blocker, blocked) = pair.key();
                if blocker == user_id {
                    Some(blocked.clone())
                } else if blocked == user_id {
                    Some(blocker.clone())
                } else {
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn upsert_interaction(&self, interaction: &Interaction) -> StoreResult<()> {
        self.interactions.insert(
            (interaction.actor_id.clone(), interaction.target_id.clone()),
            interaction.clone(),
        );
        Ok(())
    }

    async fn get_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<Interaction>> {
        Ok(self
            .interactions
            .get(&(actor_id.to_string(), target_id.to_string()))
            .map(|i| i.clone()))
    }

    async fn interacted_target_ids(&self, actor_id: &str) -> StoreResult<HashSet<String>> {
        Ok(self
            .interactions
            .iter()
            .filter(|entry| entry.key().0 == actor_id)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn create_match(&self, candidate: &Match) -> StoreResult<MatchInsert> {
        let pair = CanonicalPair::new(&candidate.user_low, &candidate.user_high);

        Ok(match self.matches.entry(pair) {
            Entry::Occupied(existing) => MatchInsert::AlreadyExists(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(candidate.clone());
                MatchInsert::Created(candidate.clone())
            }
        })
    }

    async fn find_match(&self, pair: &CanonicalPair) -> StoreResult<Option<Match>> {
        Ok(self.matches.get(pair).map(|m| m.clone()))
    }

    async fn deactivate_match(&self, pair: &CanonicalPair) -> StoreResult<bool> {
        Ok(match self.matches.get_mut(pair) {
            Some(mut found) if found.is_active() => {
                found.state = MatchState::Unmatched;
                true
            }
            _ => false,
        })
    }

    async fn list_matches(&self, user_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Match>> {
        let mut matches: Vec<Match> = self
            .matches
            .iter()
            .filter(|m| m.is_active() && m.involves(user_id))
            .map(|m| m.clone())
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn add_favorite(&self, favorite: &Favorite) -> StoreResult<bool> {
        let key = (favorite.owner_id.clone(), favorite.target_id.clone());

        Ok(match self.favorites.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(favorite.clone());
                true
            }
        })
    }

    async fn remove_favorite(&self, owner_id: &str, target_id: &str) -> StoreResult<bool> {
        Ok(self
            .favorites
            .remove(&(owner_id.to_string(), target_id.to_string()))
            .is_some())
    }

    async fn list_favorites(&self, owner_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Favorite>> {
        let mut favorites: Vec<Favorite> = self
            .favorites
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.clone())
            .collect();

        favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.target_id.cmp(&b.target_id)));

        Ok(favorites.into_iter().skip(offset).take(limit).collect())
    }

    async fn interaction_counts(&self, user_id: &str) -> StoreResult<InteractionCounts> {
        let mut counts = InteractionCounts::default();

        for entry in self.interactions.iter().filter(|e| e.actor_id == user_id) {
            match entry.kind {
                InteractionKind::Like => counts.likes += 1,
                InteractionKind::Pass => counts.passes += 1,
                InteractionKind::Superlike => counts.superlikes += 1,
            }
            if counts.last_interaction_at.map_or(true, |last| entry.created_at > last) {
                counts.last_interaction_at = Some(entry.created_at);
            }
        }

        counts.active_matches = self
            .matches
            .iter()
            .filter(|m| m.is_active() && m.involves(user_id))
            .count() as u64;

        Ok(counts)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
