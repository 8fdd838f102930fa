use crate::core::geohash::common_prefix_len;
use crate::models::{DiscoveryFilters, Profile};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Check if a candidate can be shown to the requester at all
///
/// Stage 1 of the discovery pipeline: visibility, self-exclusion, interaction
/// history and blocks.
#[inline]
pub fn is_eligible(requester: &Profile, candidate: &Profile, excluded: &HashSet<String>) -> bool {
    if !candidate.is_discoverable() {
        return false;
    }

    if candidate.user_id == requester.user_id {
        return false;
    }

    !excluded.contains(&candidate.user_id)
}

/// Check mutual orientation compatibility
///
/// Stage 2 - both sides' stated preferences must admit each other.
#[inline]
pub fn matches_preferences(requester: &Profile, candidate: &Profile) -> bool {
    requester.mutually_compatible(candidate)
}

/// Check the caller-supplied filters
///
/// Stage 3 - age range, minimum shared geohash prefix and explicit goal.
/// A candidate without a location never passes a distance filter.
#[inline]
pub fn matches_filters(
    requester: &Profile,
    candidate: &Profile,
    filters: &DiscoveryFilters,
    today: NaiveDate,
) -> bool {
    let age = candidate.age_on(today);

    if let Some(min) = filters.age_min {
        if age < u32::from(min) {
            return false;
        }
    }

    if let Some(max) = filters.age_max {
        if age > u32::from(max) {
            return false;
        }
    }

    if let Some(cells) = filters.max_distance_cells {
        match (requester.geohash(), candidate.geohash()) {
            (Some(own), Some(theirs)) => {
                if common_prefix_len(own, theirs) < usize::from(cells) {
                    return false;
                }
            }
            _ => return false,
        }
    }

    if let Some(goal) = filters.goal {
        if candidate.goal != Some(goal) {
            return false;
        }
    }

    true
}
