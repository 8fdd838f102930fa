use crate::core::{
    filters::{is_eligible, matches_filters, matches_preferences},
    geohash::approx_distance_km,
    pagination::RankKey,
    scoring::CompatibilityScorer,
};
use crate::models::{DiscoveryFilters, Profile, ScoredCandidate};
use chrono::NaiveDate;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

/// Result of ranking a candidate pool
#[derive(Debug)]
pub struct RankedPool {
    pub candidates: Vec<ScoredCandidate>,
    pub total_considered: usize,
}

/// Discovery orchestrator - implements the candidate pipeline
///
/// # Pipeline Stages
/// 1. Eligibility (visible, complete, not self, not seen, not blocked)
/// 2. Mutual orientation compatibility
/// 3. Caller filters (age, geohash distance, goal)
/// 4. Scoring and ranking
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    scorer: CompatibilityScorer,
}

impl CandidateGenerator {
    pub fn new(scorer: CompatibilityScorer) -> Self {
        Self { scorer }
    }

    /// Filter, score and order `candidates` for `requester`
    ///
    /// `excluded` holds every id the requester already acted on plus blocks
    /// in either direction.
    pub fn rank(
        &self,
        requester: &Profile,
        candidates: Vec<Profile>,
        excluded: &HashSet<String>,
        filters: &DiscoveryFilters,
        today: NaiveDate,
    ) -> RankedPool {
        let total_considered = candidates.len();
        let seed = requester_seed(&requester.user_id);
        let mut seen_ids = HashSet::new();

        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            // Stage 1: eligibility, duplicates from the store are dropped
            .filter(|profile| is_eligible(requester, profile, excluded))
            .filter(|profile| seen_ids.insert(profile.user_id.clone()))
            // Stage 2: mutual preferences
            .filter(|profile| matches_preferences(requester, profile))
            // Stage 3: caller filters
            .filter(|profile| matches_filters(requester, profile, filters, today))
            // Stage 4: scoring
            .map(|profile| {
                let parts = self.scorer.breakdown(requester, &profile);
                let score = self.scorer.weigh(&parts);

                let approx_distance_km = match (requester.geohash(), profile.geohash()) {
                    (Some(own), Some(theirs)) => approx_distance_km(own, theirs).map(round_km),
                    _ => None,
                };

                ScoredCandidate {
                    profile: profile.to_public(today),
                    score,
                    approx_distance_km,
                    shared_interests: parts.shared_interests,
                    updated_at: profile.updated_at,
                    tie_key: tie_key(seed, &profile.user_id),
                }
            })
            .collect();

        ranked.sort_by(|a, b| RankKey::of(a).cmp(&RankKey::of(b)));

        RankedPool {
            candidates: ranked,
            total_considered,
        }
    }
}

/// Stable per-requester seed (FNV-1a over the id bytes)
pub fn requester_seed(user_id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    user_id
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// Deterministic pseudo-random tie-break for one candidate
///
/// The same requester always sees equal-score candidates in the same order,
/// while different requesters see different orders.
pub fn tie_key(seed: u64, candidate_id: &str) -> u64 {
    let mut rng = StdRng::seed_from_u64(seed ^ requester_seed(candidate_id));
    rng.gen()
}

/// Round to one decimal place
fn round_km(km: f64) -> f64 {
    ((km * 10.0).round() / 10.0).max(0.0)
}
