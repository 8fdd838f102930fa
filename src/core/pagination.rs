//! Opaque cursors for paged results
//!
//! Discovery uses a keyset cursor (the sort key of the last entry returned),
//! so profiles that drop out of the pool between pages do not shift the
//! remaining ones. Match and favorite listings use plain offsets.

use crate::models::ScoredCandidate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid cursor: {0}")]
pub struct CursorError(pub String);

/// Sort key of a ranked candidate; ascending order is ranking order
#[derive(Debug, Clone, Copy)]
pub struct RankKey<'a> {
    pub score: f64,
    pub updated_ms: i64,
    pub tie: u64,
    pub user_id: &'a str,
}

impl<'a> RankKey<'a> {
    pub fn of(candidate: &'a ScoredCandidate) -> Self {
        Self {
            score: candidate.score,
            updated_ms: candidate.updated_at.timestamp_millis(),
            tie: candidate.tie_key,
            user_id: &candidate.profile.user_id,
        }
    }
}

impl Ord for RankKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Score desc, most recently updated first, seeded tie key, then id
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.updated_ms.cmp(&self.updated_ms))
            .then_with(|| self.tie.cmp(&other.tie))
            .then_with(|| self.user_id.cmp(other.user_id))
    }
}

impl PartialOrd for RankKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey<'_> {}

/// Continuation point inside a ranked discovery pool
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryCursor {
    score_bits: u64,
    updated_ms: i64,
    tie: u64,
    user_id: String,
}

impl DiscoveryCursor {
    pub fn after(candidate: &ScoredCandidate) -> Self {
        let key = RankKey::of(candidate);
        Self {
            score_bits: key.score.to_bits(),
            updated_ms: key.updated_ms,
            tie: key.tie,
            user_id: key.user_id.to_string(),
        }
    }

    pub fn key(&self) -> RankKey<'_> {
        RankKey {
            score: f64::from_bits(self.score_bits),
            updated_ms: self.updated_ms,
            tie: self.tie,
            user_id: &self.user_id,
        }
    }
}

impl fmt::Display for DiscoveryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}.{}.{:016x}.{}", self.score_bits, self.updated_ms, self.tie, self.user_id)
    }
}

impl FromStr for DiscoveryCursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, '.');
        let bad = || CursorError(s.to_string());

        let score_bits = parts.next().and_then(|p| u64::from_str_radix(p, 16).ok()).ok_or_else(bad)?;
        let updated_ms = parts.next().and_then(|p| p.parse::<i64>().ok()).ok_or_else(bad)?;
        let tie = parts.next().and_then(|p| u64::from_str_radix(p, 16).ok()).ok_or_else(bad)?;
        let user_id = parts.next().filter(|p| !p.is_empty()).ok_or_else(bad)?.to_string();

        if !f64::from_bits(score_bits).is_finite() {
            return Err(bad());
        }

        Ok(Self { score_bits, updated_ms, tie, user_id })
    }
}

/// Slice one page out of a ranked pool
///
/// Returns the page and the cursor for the following one, if any.
pub fn page_after<'a>(
    pool: &'a [ScoredCandidate],
    cursor: Option<&DiscoveryCursor>,
    limit: usize,
) -> (&'a [ScoredCandidate], Option<DiscoveryCursor>) {
    let start = match cursor {
        Some(c) => {
            let key = c.key();
            pool.partition_point(|candidate| RankKey::of(candidate) <= key)
        }
        None => 0,
    };

    let end = start.saturating_add(limit).min(pool.len());
    let page = &pool[start..end];

    let next = if end < pool.len() {
        page.last().map(DiscoveryCursor::after)
    } else {
        None
    };

    (page, next)
}

/// Parse an offset cursor; absent means the first page
pub fn parse_offset(cursor: Option<&str>) -> Result<usize, CursorError> {
    match cursor.map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => raw.parse::<usize>().map_err(|_| CursorError(raw.to_string())),
        None => Ok(0),
    }
}

/// Cursor for the page after `offset + returned`, if more rows exist
pub fn next_offset(offset: usize, returned: usize, has_more: bool) -> Option<String> {
    has_more.then(|| (offset + returned).to_string())
}
