use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Interest tags beyond this count are ignored by scoring
pub const MAX_INTERESTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non_binary",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "non_binary" | "nonbinary" | "non-binary" => Ok(Gender::NonBinary),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

/// What a user is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatingGoal {
    Relationship,
    Dating,
    Casual,
    Friendship,
}

/// How well two declared goals line up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalAlignment {
    Identical,
    Compatible,
    Incompatible,
}

impl DatingGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatingGoal::Relationship => "relationship",
            DatingGoal::Dating => "dating",
            DatingGoal::Casual => "casual",
            DatingGoal::Friendship => "friendship",
        }
    }

    pub fn alignment(self, other: DatingGoal) -> GoalAlignment {
        use DatingGoal::*;

        if self == other {
            return GoalAlignment::Identical;
        }

        match (self, other) {
            (Dating, Relationship) | (Relationship, Dating) => GoalAlignment::Compatible,
            (Casual, Friendship) | (Friendship, Casual) => GoalAlignment::Compatible,
            (Dating, Casual) | (Casual, Dating) => GoalAlignment::Compatible,
            _ => GoalAlignment::Incompatible,
        }
    }
}

impl FromStr for DatingGoal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relationship" => Ok(DatingGoal::Relationship),
            "dating" => Ok(DatingGoal::Dating),
            "casual" => Ok(DatingGoal::Casual),
            "friendship" => Ok(DatingGoal::Friendship),
            other => Err(format!("unknown dating goal: {}", other)),
        }
    }
}

impl fmt::Display for DatingGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw coordinates, kept only so the owner's update path can re-encode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Location of a profile as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub geohash: String,
    #[serde(default, skip_serializing)]
    pub coordinates: Option<Coordinates>,
}

/// Dating profile as read from the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(rename = "birthDate")]
    pub birth_date: NaiveDate,
    pub gender: Gender,
    #[serde(rename = "interestedIn", default)]
    pub interested_in: BTreeSet<Gender>,
    #[serde(default)]
    pub goal: Option<DatingGoal>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(rename = "isVisible", default = "default_true")]
    pub visible: bool,
    #[serde(rename = "isComplete", default = "default_true")]
    pub complete: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

impl Profile {
    /// Age in whole years on the given day
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_between(self.birth_date, today)
    }

    /// Whether this profile's stated preference admits `other`
    pub fn accepts(&self, other: &Profile) -> bool {
        self.interested_in.is_empty() || self.interested_in.contains(&other.gender)
    }

    /// Both sides' stated preferences admit each other
    pub fn mutually_compatible(&self, other: &Profile) -> bool {
        self.accepts(other) && other.accepts(self)
    }

    pub fn geohash(&self) -> Option<&str> {
        self.location
            .as_ref()
            .map(|l| l.geohash.as_str())
            .filter(|h| !h.is_empty())
    }

    /// Normalized interest tags, capped at [`MAX_INTERESTS`]
    pub fn normalized_interests(&self) -> BTreeSet<String> {
        self.interests
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .take(MAX_INTERESTS)
            .collect()
    }

    /// Whether the profile can be shown to or act as another user
    pub fn is_discoverable(&self) -> bool {
        self.visible && self.complete
    }

    pub fn to_public(&self, today: NaiveDate) -> PublicProfile {
        PublicProfile {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            age: self.age_on(today),
            gender: self.gender,
            goal: self.goal,
            bio: self.bio.clone(),
            interests: self.interests.iter().cloned().collect(),
            geohash: self.geohash().map(str::to_string),
        }
    }
}

/// Profile view handed to other users. Never carries raw coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub goal: Option<DatingGoal>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub geohash: Option<String>,
}

/// Swipe action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Pass,
    Superlike,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Pass => "pass",
            InteractionKind::Superlike => "superlike",
        }
    }

    /// Like and superlike count as interest for match detection
    pub fn is_positive(&self) -> bool {
        matches!(self, InteractionKind::Like | InteractionKind::Superlike)
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" | "liked" => Ok(InteractionKind::Like),
            "pass" | "passed" => Ok(InteractionKind::Pass),
            "superlike" | "super_like" | "superliked" => Ok(InteractionKind::Superlike),
            other => Err(format!(
                "interaction kind must be one of: like, pass, superlike (got {})",
                other
            )),
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded swipe from `actor_id` toward `target_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub actor_id: String,
    pub target_id: String,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Active,
    Unmatched,
}

/// Mutual match between two users, stored in canonical pair order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub user_low: String,
    pub user_high: String,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn is_active(&self) -> bool {
        self.state == MatchState::Active
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    /// The participant that is not `user_id`
    pub fn other(&self, user_id: &str) -> &str {
        if self.user_low == user_id {
            &self.user_high
        } else {
            &self.user_low
        }
    }
}

/// Bookmark of `target_id` by `owner_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub owner_id: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user interaction counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionCounts {
    pub likes: u64,
    pub passes: u64,
    pub superlikes: u64,
    pub active_matches: u64,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

/// A ranked discovery candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub profile: PublicProfile,
    pub score: f64,
    #[serde(rename = "approxDistanceKm")]
    pub approx_distance_km: Option<f64>,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub tie_key: u64,
}

/// Scoring weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub interests: f64,
    pub location: f64,
    pub goal: f64,
    pub age: f64,
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.interests + self.location + self.goal + self.age
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            interests: 0.40,
            location: 0.30,
            goal: 0.20,
            age: 0.10,
        }
    }
}

/// Coarse prefilter pushed down to the profile store
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery {
    pub requester_id: String,
    pub genders: Vec<Gender>,
    pub geohash_prefix: Option<String>,
    /// Ids already swiped or blocked; never returned
    pub excluded_ids: Vec<String>,
    pub limit: usize,
}

/// Calendar date helper shared by filters and views
pub fn today_of(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Age of someone born on `birth_date`, used where no profile is at hand
pub fn age_between(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}
