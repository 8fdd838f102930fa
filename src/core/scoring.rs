use crate::core::geohash::common_prefix_len;
use crate::models::{GoalAlignment, Profile, ScoringWeights};

/// Tunable parameters of the compatibility score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParams {
    pub weights: ScoringWeights,
    /// Geohash prefix length at which two locations count as "same area"
    pub comparison_length: usize,
    /// Location sub-score for each character short of `comparison_length`
    pub location_decay: Vec<f64>,
    pub compatible_goal_score: f64,
    pub max_age_gap_years: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            comparison_length: 5,
            location_decay: vec![0.5, 0.2],
            compatible_goal_score: 0.5,
            max_age_gap_years: 20.0,
        }
    }
}

/// Individual sub-scores, each in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub interests: f64,
    pub location: f64,
    pub goal: f64,
    pub age: f64,
    pub shared_interests: Vec<String>,
}

/// Pure, symmetric compatibility scorer
///
/// score = (
///     interest_jaccard * 0.40 +    # shared tags over all tags
///     location * 0.30 +            # geohash prefix agreement
///     goal * 0.20 +                # identical or compatible goals
///     age * 0.10                   # 1 - gap / max_gap
/// ) / sum(weights)
#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    params: ScoringParams,
}

impl CompatibilityScorer {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Weighted score in [0, 1]
    pub fn score(&self, a: &Profile, b: &Profile) -> f64 {
        self.weigh(&self.breakdown(a, b))
    }

    /// Combine a breakdown with the configured weights
    pub fn weigh(&self, parts: &ScoreBreakdown) -> f64 {
        let w = &self.params.weights;
        let total = w.total();
        if !total.is_finite() || total <= 0.0 {
            return 0.0;
        }

        let raw = parts.interests * w.interests
            + parts.location * w.location
            + parts.goal * w.goal
            + parts.age * w.age;

        (raw / total).clamp(0.0, 1.0)
    }

    pub fn breakdown(&self, a: &Profile, b: &Profile) -> ScoreBreakdown {
        let (interests, shared_interests) = interest_overlap(a, b);

        ScoreBreakdown {
            interests,
            location: self.location_score(a, b),
            goal: self.goal_score(a, b),
            age: self.age_score(a, b),
            shared_interests,
        }
    }

    fn location_score(&self, a: &Profile, b: &Profile) -> f64 {
        let (Some(hash_a), Some(hash_b)) = (a.geohash(), b.geohash()) else {
            return 0.0;
        };

        let shared = common_prefix_len(hash_a, hash_b);
        let wanted = self.params.comparison_length;
        if shared >= wanted {
            return 1.0;
        }

        let deficit = wanted - shared;
        self.params
            .location_decay
            .get(deficit - 1)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }

    fn goal_score(&self, a: &Profile, b: &Profile) -> f64 {
        match (a.goal, b.goal) {
            (Some(goal_a), Some(goal_b)) => match goal_a.alignment(goal_b) {
                GoalAlignment::Identical => 1.0,
                GoalAlignment::Compatible => self.params.compatible_goal_score.clamp(0.0, 1.0),
                GoalAlignment::Incompatible => 0.0,
            },
            _ => 0.0,
        }
    }

    fn age_score(&self, a: &Profile, b: &Profile) -> f64 {
        let gap_days = (a.birth_date - b.birth_date).num_days().abs() as f64;
        let gap_years = gap_days / 365.25;
        let max_gap = self.params.max_age_gap_years;

        if max_gap <= 0.0 {
            return if gap_years < 1.0 { 1.0 } else { 0.0 };
        }

        (1.0 - gap_years / max_gap).max(0.0)
    }
}

/// Jaccard similarity of interest tags plus the shared tags, sorted
fn interest_overlap(a: &Profile, b: &Profile) -> (f64, Vec<String>) {
    let tags_a = a.normalized_interests();
    let tags_b = b.normalized_interests();

    if tags_a.is_empty() || tags_b.is_empty() {
        return (0.0, Vec::new());
    }

    let shared: Vec<String> = tags_a.intersection(&tags_b).cloned().collect();
    let union = tags_a.union(&tags_b).count();

    (shared.len() as f64 / union as f64, shared)
}
