// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    age_between, today_of, CandidateQuery, Coordinates, DatingGoal, Favorite, Gender, GoalAlignment,
    Interaction, InteractionCounts, InteractionKind, Location, Match, MatchState, Profile,
    PublicProfile, ScoredCandidate, ScoringWeights, MAX_INTERESTS,
};
pub use requests::{DiscoverRequest, DiscoveryFilters, FavoriteRequest, ListQuery, RecordInteractionRequest, UserQuery};
pub use responses::{
    DiscoverResponse, ErrorResponse, FavoritesResponse, HealthResponse, MatchView, MatchesResponse,
    OkResponse, QuotaResponse, RecordInteractionResponse, StatsResponse,
};
