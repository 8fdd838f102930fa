//! Matching engine facade
//!
//! Orchestrates the stores, the candidate generator, the caches and the rate
//! limiter. Every public operation validates its input, gates on the rate
//! limiter where a bucket applies, and maps store failures into
//! [`MatchError`].

use crate::config::Settings;
use crate::core::geohash::{self, encode, truncate};
use crate::core::interactions::{is_reciprocated, triggers_match_check, CanonicalPair, MatchInsert};
use crate::core::pagination::{next_offset, page_after, parse_offset, DiscoveryCursor};
use crate::core::{CandidateGenerator, CompatibilityScorer};
use crate::error::{MatchError, MatchResult};
use crate::models::{
    today_of, CandidateQuery, DiscoverResponse, DiscoveryFilters, Favorite, FavoritesResponse, Interaction,
    InteractionKind, Location, Match, MatchState, MatchView, MatchesResponse, OkResponse, Profile, QuotaResponse,
    RecordInteractionResponse, ScoredCandidate, StatsResponse,
};
use crate::services::cache::{CacheKey, CacheStats, TtlCache};
use crate::services::clock::Clock;
use crate::services::rate_limit::{Bucket, RateLimiter};
use crate::services::store::{InteractionStore, ProfileStore, StoreError};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Ranked pool shared between concurrent discovery pages
pub type SharedPool = Arc<Vec<ScoredCandidate>>;

/// Tunables the engine reads on every call
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub discovery_ttl: Duration,
    pub profile_ttl: Duration,
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_pool_size: usize,
    pub geohash_precision: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            discovery_ttl: Duration::from_secs(60),
            profile_ttl: Duration::from_secs(30),
            default_limit: 20,
            max_limit: 100,
            max_pool_size: 500,
            geohash_precision: geohash::DEFAULT_PRECISION,
        }
    }
}

/// The two caches the engine reads through
pub struct EngineCaches {
    pub pools: TtlCache<SharedPool>,
    pub profiles: TtlCache<Profile>,
}

impl EngineCaches {
    pub fn new(max_entries: u64, max_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            pools: TtlCache::new(max_entries, max_ttl, clock.clone()),
            profiles: TtlCache::new(max_entries, max_ttl, clock),
        }
    }
}

/// Cache counters for both caches plus limiter bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct EngineCacheStats {
    pub discovery: CacheStats,
    pub profiles: CacheStats,
    pub rate_limit_windows: usize,
}

/// What one maintenance pass removed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub expired_pools: usize,
    pub expired_profiles: usize,
    pub pruned_windows: usize,
}

pub struct MatchEngine {
    profiles: Arc<dyn ProfileStore>,
    interactions: Arc<dyn InteractionStore>,
    generator: CandidateGenerator,
    caches: EngineCaches,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    /// Bumped on every invalidation so in-flight pool builds can detect staleness
    pool_generations: DashMap<String, u64>,
}

impl MatchEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        interactions: Arc<dyn InteractionStore>,
        generator: CandidateGenerator,
        caches: EngineCaches,
        limiter: RateLimiter,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            profiles,
            interactions,
            generator,
            caches,
            limiter,
            clock,
            settings,
            pool_generations: DashMap::new(),
        }
    }

    /// Wire an engine from loaded configuration
    pub fn from_settings(
        settings: &Settings,
        profiles: Arc<dyn ProfileStore>,
        interactions: Arc<dyn InteractionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scorer = CompatibilityScorer::new(settings.scoring.params());
        let caches = EngineCaches::new(
            settings.cache.max_entries,
            settings.cache.max_ttl(),
            clock.clone(),
        );
        let limiter = RateLimiter::new(
            settings.rate_limit.limits(),
            Duration::from_secs(settings.rate_limit.prune_interval_secs),
            clock.clone(),
        );

        Self::new(
            profiles,
            interactions,
            CandidateGenerator::new(scorer),
            caches,
            limiter,
            clock,
            settings.engine_settings(),
        )
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ---- discovery ------------------------------------------------------

    /// One page of ranked candidates for `requester_id`
    pub async fn discover(
        &self,
        requester_id: &str,
        filters: &DiscoveryFilters,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> MatchResult<DiscoverResponse> {
        require_id(requester_id, "userId")?;
        filters.check()?;
        let limit = self.resolve_limit(limit)?;
        let cursor = cursor
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse::<DiscoveryCursor>)
            .transpose()?;

        let requester = self.resolve_profile(requester_id).await?;
        self.gate(requester_id, Bucket::Discover)?;

        let effective = filters.capped_to(self.settings.geohash_precision);
        let pool = self.ranked_pool(&requester, &effective).await?;
        let (page, next) = page_after(&pool, cursor.as_ref(), limit);

        tracing::info!(
            user_id = requester_id,
            pool = pool.len(),
            returned = page.len(),
            filters = %filters.signature(),
            "discovery page served"
        );

        Ok(DiscoverResponse {
            profiles: page.to_vec(),
            next_cursor: next.map(|c| c.to_string()),
            suggest_relaxed_filters: page.is_empty() && filters.is_constrained(),
        })
    }

    async fn ranked_pool(&self, requester: &Profile, filters: &DiscoveryFilters) -> MatchResult<SharedPool> {
        let key = CacheKey::discovery(&requester.user_id, &filters.signature());

        if let Some(pool) = self.caches.pools.get(&key).await {
            return Ok(pool);
        }

        let generation = self.pool_generation(&requester.user_id);

        let (interacted, blocked) = tokio::try_join!(
            self.interactions.interacted_target_ids(&requester.user_id),
            self.profiles.blocked_user_ids(&requester.user_id),
        )?;
        let excluded: HashSet<String> = interacted.into_iter().chain(blocked).collect();

        let query = CandidateQuery {
            requester_id: requester.user_id.clone(),
            genders: requester.interested_in.iter().copied().collect(),
            geohash_prefix: match (filters.max_distance_cells, requester.geohash()) {
                (Some(cells), Some(own)) => Some(truncate(own, usize::from(cells)).to_lowercase()),
                _ => None,
            },
            excluded_ids: excluded.iter().cloned().collect(),
            limit: self.settings.max_pool_size,
        };
        let candidates = self.profiles.candidate_profiles(&query).await?;
        let precision = self.settings.geohash_precision;
        let candidates = candidates
            .into_iter()
            .map(|profile| privatize(profile, precision))
            .collect();

        let today = today_of(self.clock.now());
        let ranked = self.generator.rank(requester, candidates, &excluded, filters, today);

        tracing::debug!(
            user_id = %requester.user_id,
            considered = ranked.total_considered,
            ranked = ranked.candidates.len(),
            excluded = excluded.len(),
            "discovery pool built"
        );

        let pool: SharedPool = Arc::new(ranked.candidates);
        self.caches
            .pools
            .set(&key, pool.clone(), self.settings.discovery_ttl)
            .await;

        // An invalidation that raced the build bumped the generation before
        // deleting, so either it removed our entry or we see the bump here
        if self.pool_generation(&requester.user_id) != generation {
            self.caches.pools.delete(&key).await;
            tracing::debug!(user_id = %requester.user_id, "discarded pool built across an invalidation");
        }

        Ok(pool)
    }

    // ---- interactions and matches ----------------------------------------

    /// Record a swipe and materialize the match if it is mutual
    pub async fn record_interaction(
        &self,
        actor_id: &str,
        target_id: &str,
        kind: &str,
    ) -> MatchResult<RecordInteractionResponse> {
        require_id(actor_id, "userId")?;
        require_id(target_id, "targetUserId")?;
        let kind: InteractionKind = kind.parse().map_err(MatchError::Validation)?;
        if actor_id == target_id {
            return Err(MatchError::validation("cannot interact with yourself"));
        }

        self.resolve_profile(actor_id).await?;
        self.resolve_profile(target_id).await?;

        let bucket = match kind {
            InteractionKind::Superlike => Bucket::Superlike,
            InteractionKind::Like | InteractionKind::Pass => Bucket::Swipe,
        };
        self.gate(actor_id, bucket)?;

        let now = self.clock.now();
        let interaction = Interaction {
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            created_at: now,
        };

        match self.interactions.upsert_interaction(&interaction).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(detail)) => {
                tracing::debug!(actor_id, target_id, %detail, "concurrent interaction write resolved");
            }
            Err(e) => return Err(e.into()),
        }
        self.invalidate_pools(actor_id).await;

        tracing::info!(actor_id, target_id, kind = kind.as_str(), "interaction recorded");

        let pair = CanonicalPair::new(actor_id, target_id);

        if triggers_match_check(kind) {
            let reciprocal = self.interactions.get_interaction(target_id, actor_id).await?;
            if is_reciprocated(reciprocal.as_ref()) {
                return self.materialize_match(pair).await;
            }
        }

        let existing = self.interactions.find_match(&pair).await?;
        Ok(RecordInteractionResponse {
            match_created: false,
            match_id: existing.filter(Match::is_active).map(|m| m.id),
        })
    }

    async fn materialize_match(&self, pair: CanonicalPair) -> MatchResult<RecordInteractionResponse> {
        let candidate = Match {
            id: Uuid::new_v4(),
            user_low: pair.low.clone(),
            user_high: pair.high.clone(),
            state: MatchState::Active,
            created_at: self.clock.now(),
        };

        let outcome = match self.interactions.create_match(&candidate).await {
            Ok(outcome) => outcome,
            Err(StoreError::Duplicate(detail)) => {
                tracing::debug!(low = %pair.low, high = %pair.high, %detail, "concurrent match insert resolved");
                self.interactions
                    .find_match(&pair)
                    .await?
                    .map(MatchInsert::AlreadyExists)
                    .ok_or_else(|| MatchError::Internal(format!("match for {}/{} vanished", pair.low, pair.high)))?
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            MatchInsert::Created(created) => {
                self.invalidate_pools(&pair.low).await;
                self.invalidate_pools(&pair.high).await;
                tracing::info!(match_id = %created.id, low = %pair.low, high = %pair.high, "match created");

                Ok(RecordInteractionResponse {
                    match_created: true,
                    match_id: Some(created.id),
                })
            }
            MatchInsert::AlreadyExists(existing) => {
                tracing::debug!(match_id = %existing.id, state = ?existing.state, "match already exists");

                Ok(RecordInteractionResponse {
                    match_created: false,
                    match_id: existing.is_active().then_some(existing.id),
                })
            }
        }
    }

    /// Active matches of `user_id`, newest first
    pub async fn list_matches(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> MatchResult<MatchesResponse> {
        require_id(user_id, "userId")?;
        let limit = self.resolve_limit(limit)?;
        let offset = parse_offset(cursor)?;
        self.resolve_profile(user_id).await?;

        let mut rows = self
            .interactions
            .list_matches(user_id, offset, limit.saturating_add(1))
            .await?;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let today = today_of(self.clock.now());
        let mut matches = Vec::with_capacity(rows.len());
        for m in &rows {
            let other_id = m.other(user_id);
            let profile = self.visible_profile(other_id).await?.map(|p| p.to_public(today));

            matches.push(MatchView {
                match_id: m.id,
                other_user_id: other_id.to_string(),
                profile,
                state: m.state,
                matched_at: m.created_at,
            });
        }

        Ok(MatchesResponse {
            next_cursor: next_offset(offset, rows.len(), has_more),
            matches,
        })
    }

    /// Soft-deactivate the match between two users; absent matches are a no-op
    pub async fn unmatch(&self, user_id: &str, other_id: &str) -> MatchResult<OkResponse> {
        require_id(user_id, "userId")?;
        require_id(other_id, "otherUserId")?;
        if user_id == other_id {
            return Err(MatchError::validation("cannot unmatch yourself"));
        }
        self.resolve_profile(user_id).await?;

        let pair = CanonicalPair::new(user_id, other_id);
        if self.interactions.deactivate_match(&pair).await? {
            self.invalidate_pools(&pair.low).await;
            self.invalidate_pools(&pair.high).await;
            tracing::info!(user_id, other_id, "match deactivated");
        } else {
            tracing::debug!(user_id, other_id, "no active match to deactivate");
        }

        Ok(OkResponse::ok())
    }

    pub async fn interaction_stats(&self, user_id: &str) -> MatchResult<StatsResponse> {
        require_id(user_id, "userId")?;
        self.resolve_profile(user_id).await?;

        let counts = self.interactions.interaction_counts(user_id).await?;

        Ok(StatsResponse {
            user_id: user_id.to_string(),
            counts,
        })
    }

    // ---- favorites ---------------------------------------------------------

    /// Bookmark `target_id`; repeating the call is a no-op
    pub async fn add_favorite(&self, owner_id: &str, target_id: &str) -> MatchResult<OkResponse> {
        require_id(owner_id, "userId")?;
        require_id(target_id, "targetUserId")?;
        if owner_id == target_id {
            return Err(MatchError::validation("cannot favorite yourself"));
        }
        self.resolve_profile(owner_id).await?;
        self.resolve_profile(target_id).await?;

        let favorite = Favorite {
            owner_id: owner_id.to_string(),
            target_id: target_id.to_string(),
            created_at: self.clock.now(),
        };

        match self.interactions.add_favorite(&favorite).await {
            Ok(true) => tracing::info!(owner_id, target_id, "favorite added"),
            Ok(false) => tracing::debug!(owner_id, target_id, "favorite already present"),
            Err(StoreError::Duplicate(detail)) => {
                tracing::debug!(owner_id, target_id, %detail, "concurrent favorite insert resolved");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(OkResponse::ok())
    }

    pub async fn remove_favorite(&self, owner_id: &str, target_id: &str) -> MatchResult<OkResponse> {
        require_id(owner_id, "userId")?;
        require_id(target_id, "targetUserId")?;
        self.resolve_profile(owner_id).await?;

        if self.interactions.remove_favorite(owner_id, target_id).await? {
            tracing::info!(owner_id, target_id, "favorite removed");
        }

        Ok(OkResponse::ok())
    }

    /// Favorites of `owner_id`, newest first; hidden profiles are skipped
    pub async fn list_favorites(
        &self,
        owner_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> MatchResult<FavoritesResponse> {
        require_id(owner_id, "userId")?;
        let limit = self.resolve_limit(limit)?;
        let offset = parse_offset(cursor)?;
        self.resolve_profile(owner_id).await?;

        let mut rows = self
            .interactions
            .list_favorites(owner_id, offset, limit.saturating_add(1))
            .await?;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let today = today_of(self.clock.now());
        let mut profiles = Vec::with_capacity(rows.len());
        for favorite in &rows {
            if let Some(profile) = self.visible_profile(&favorite.target_id).await? {
                profiles.push(profile.to_public(today));
            }
        }

        Ok(FavoritesResponse {
            profiles,
            next_cursor: next_offset(offset, rows.len(), has_more),
        })
    }

    // ---- quota, caches, maintenance -------------------------------------

    /// Calls left in each bucket for `user_id`
    pub fn quota(&self, user_id: &str) -> MatchResult<QuotaResponse> {
        require_id(user_id, "userId")?;

        Ok(QuotaResponse {
            discover: self.limiter.remaining(user_id, Bucket::Discover),
            swipe: self.limiter.remaining(user_id, Bucket::Swipe),
            superlike: self.limiter.remaining(user_id, Bucket::Superlike),
        })
    }

    pub async fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            discovery: self.caches.pools.stats().await,
            profiles: self.caches.profiles.stats().await,
            rate_limit_windows: self.limiter.tracked_windows(),
        }
    }

    /// Drop expired cache entries and closed rate-limit windows
    pub async fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            expired_pools: self.caches.pools.sweep().await,
            expired_profiles: self.caches.profiles.sweep().await,
            pruned_windows: self.limiter.prune(),
        };

        tracing::debug!(
            expired_pools = report.expired_pools,
            expired_profiles = report.expired_profiles,
            pruned_windows = report.pruned_windows,
            "maintenance sweep finished"
        );

        report
    }

    pub async fn health_check(&self) -> bool {
        match self.interactions.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(error = %e, "store health check failed");
                false
            }
        }
    }

    // ---- helpers -----------------------------------------------------------

    fn resolve_limit(&self, limit: Option<usize>) -> MatchResult<usize> {
        match limit {
            None => Ok(self.settings.default_limit.min(self.settings.max_limit)),
            Some(0) => Err(MatchError::validation("limit must be at least 1")),
            Some(n) => Ok(n.min(self.settings.max_limit)),
        }
    }

    fn gate(&self, user_id: &str, bucket: Bucket) -> MatchResult<()> {
        if self.limiter.allow(user_id, bucket) {
            return Ok(());
        }

        let retry_after = self.limiter.retry_after(user_id, bucket);
        Err(MatchError::RateLimitExceeded {
            bucket,
            retry_after_secs: retry_after.as_secs_f64().ceil().max(1.0) as u64,
        })
    }

    /// Existing, visible profile or NotFound
    async fn resolve_profile(&self, user_id: &str) -> MatchResult<Profile> {
        self.visible_profile(user_id)
            .await?
            .ok_or_else(|| MatchError::not_found(format!("profile {} not found", user_id)))
    }

    async fn visible_profile(&self, user_id: &str) -> MatchResult<Option<Profile>> {
        let key = CacheKey::profile(user_id);

        if let Some(profile) = self.caches.profiles.get(&key).await {
            return Ok(profile.visible.then_some(profile));
        }

        let Some(profile) = self.profiles.get_profile(user_id).await? else {
            return Ok(None);
        };

        let profile = privatize(profile, self.settings.geohash_precision);
        self.caches
            .profiles
            .set(&key, profile.clone(), self.settings.profile_ttl)
            .await;

        Ok(profile.visible.then_some(profile))
    }

    fn pool_generation(&self, user_id: &str) -> u64 {
        self.pool_generations.get(user_id).map(|g| *g).unwrap_or(0)
    }

    async fn invalidate_pools(&self, user_id: &str) {
        *self.pool_generations.entry(user_id.to_string()).or_insert(0) += 1;
        self.caches
            .pools
            .delete_by_prefix(&CacheKey::discovery_prefix(user_id))
            .await;
    }
}

fn require_id(value: &str, field: &str) -> MatchResult<()> {
    if value.trim().is_empty() {
        return Err(MatchError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Coarsen a profile's location to `precision` and drop raw coordinates
///
/// A profile carrying only coordinates gets its cell computed here; invalid
/// coordinates leave the profile without a location.
fn privatize(mut profile: Profile, precision: usize) -> Profile {
    profile.location = profile.location.take().and_then(|location| {
        let hash = if location.geohash.is_empty() {
            let coords = location.coordinates?;
            match encode(coords.latitude, coords.longitude, precision) {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::warn!(user_id = %profile.user_id, error = %e, "discarding invalid coordinates");
                    return None;
                }
            }
        } else {
            truncate(&location.geohash, precision).to_lowercase()
        };

        Some(Location {
            geohash: hash,
            coordinates: None,
        })
    });

    profile
}
