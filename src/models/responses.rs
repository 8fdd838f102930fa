use crate::models::domain::{InteractionCounts, MatchState, PublicProfile, ScoredCandidate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response for the discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub profiles: Vec<ScoredCandidate>,
    pub next_cursor: Option<String>,
    /// Set when the page is empty and caller filters were in effect
    pub suggest_relaxed_filters: bool,
}

/// Response for recording an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInteractionResponse {
    pub match_created: bool,
    pub match_id: Option<Uuid>,
}

/// One match as seen by one of its participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchView {
    pub match_id: Uuid,
    #[serde(rename = "otherUserId")]
    pub other_user_id: String,
    /// Absent when the other profile is no longer visible
    pub profile: Option<PublicProfile>,
    pub state: MatchState,
    pub matched_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesResponse {
    pub profiles: Vec<PublicProfile>,
    pub next_cursor: Option<String>,
}

/// Acknowledgement for idempotent writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Remaining quota per rate-limit bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub discover: u32,
    pub swipe: u32,
    pub superlike: u32,
}

/// Interaction statistics for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub counts: InteractionCounts,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
