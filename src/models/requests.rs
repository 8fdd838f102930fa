use crate::models::DatingGoal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Optional discovery filters; an absent field means "no constraint"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DiscoveryFilters {
    #[validate(range(min = 18, max = 120))]
    #[serde(alias = "age_min", rename = "ageMin", default)]
    pub age_min: Option<u8>,
    #[validate(range(min = 18, max = 120))]
    #[serde(alias = "age_max", rename = "ageMax", default)]
    pub age_max: Option<u8>,
    /// Minimum number of geohash characters a candidate must share
    #[validate(range(min = 1, max = 12))]
    #[serde(alias = "max_distance_cells", rename = "maxDistanceCells", default)]
    pub max_distance_cells: Option<u8>,
    #[serde(default)]
    pub goal: Option<DatingGoal>,
}

impl DiscoveryFilters {
    /// Field ranges plus `age_min <= age_max`
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if let (Some(min), Some(max)) = (self.age_min, self.age_max) {
            if min > max {
                let mut error = ValidationError::new("age_order");
                error.message = Some("ageMin must not exceed ageMax".into());
                errors.add("ageMin", error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Copy with the distance filter capped at `precision` characters
    ///
    /// Stored locations are never finer than `precision`, so a longer shared
    /// prefix could never be satisfied.
    pub fn capped_to(&self, precision: usize) -> Self {
        let cap = u8::try_from(precision).unwrap_or(u8::MAX);
        Self {
            max_distance_cells: self.max_distance_cells.map(|cells| cells.min(cap)),
            ..self.clone()
        }
    }

    /// Whether any filter narrows the pool
    pub fn is_constrained(&self) -> bool {
        self.age_min.is_some()
            || self.age_max.is_some()
            || self.max_distance_cells.is_some()
            || self.goal.is_some()
    }

    /// Stable cache-key fragment identifying this filter combination
    pub fn signature(&self) -> String {
        fn part<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string())
        }

        format!(
            "a{}-{}:d{}:g{}",
            part(self.age_min),
            part(self.age_max),
            part(self.max_distance_cells),
            part(self.goal)
        )
    }
}

/// Request for a discovery page
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DiscoverRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub filters: DiscoveryFilters,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u16>,
}

/// Request to record a swipe
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordInteractionRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_user_id", rename = "targetUserId")]
    pub target_user_id: String,
    #[validate(length(min = 1))]
    pub kind: String,
}

/// Request to add or remove a favorite
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FavoriteRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_user_id", rename = "targetUserId")]
    pub target_user_id: String,
}

/// Query string for paged listings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u16>,
}

/// Query string carrying only the caller's id
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}
