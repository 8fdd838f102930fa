use crate::models::{Interaction, InteractionKind, Match};
use serde::Serialize;

/// Unordered user pair, lower id first
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CanonicalPair {
    pub low: String,
    pub high: String,
}

impl CanonicalPair {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

/// What happened to the pair's match row during one call
#[derive(Debug, Clone, PartialEq)]
pub enum MatchInsert {
    /// This call inserted the row
    Created(Match),
    /// The uniqueness constraint resolved the insert to an existing row
    AlreadyExists(Match),
}

impl MatchInsert {
    pub fn into_match(self) -> Match {
        match self {
            MatchInsert::Created(m) | MatchInsert::AlreadyExists(m) => m,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, MatchInsert::Created(_))
    }
}

/// Whether recording `kind` should be followed by a reciprocity check
pub fn triggers_match_check(kind: InteractionKind) -> bool {
    kind.is_positive()
}

/// Whether the reciprocal interaction completes a mutual match
pub fn is_reciprocated(reciprocal: Option<&Interaction>) -> bool {
    reciprocal.is_some_and(|i| i.kind.is_positive())
}
