mod grade;
mod policy;

pub use grade::{GradeBand, GradeLetter, GradeScale, RiskGrade};
pub use policy::{
    RiskRating, ScoringPolicy, Thresholds, DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_MEDIUM,
};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{GroupId, QuestionId, TypeId};
use super::snapshot::{Snapshot, SnapshotGroup, SnapshotType};

/// raw/max/percentage triple with its classifications.
///
/// `grade` is only present when a grade scale applies; displays should prefer it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub raw_score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub risk_rating: RiskRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<RiskGrade>,
}

impl ScoreSummary {
    pub fn display_label(&self) -> &str {
        match &self.grade {
            Some(grade) => grade.grade.as_str(),
            None => self.risk_rating.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group_id: GroupId,
    pub group_name: String,
    #[serde(flatten)]
    pub score: ScoreSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeResult {
    pub type_id: TypeId,
    pub type_name: String,
    pub weight: f64,
    #[serde(flatten)]
    pub score: ScoreSummary,
    pub groups: Vec<GroupResult>,
}

/// Complete scoring output stored with a completed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub type_results: Vec<TypeResult>,
    pub overall_result: ScoreSummary,
}

/// Stateless scorer; the same snapshot and answers always yield the same card.
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// `awarded` maps each answered question to the score of its selected option.
    pub fn score(&self, snapshot: &Snapshot, awarded: &HashMap<QuestionId, u32>) -> ScoreCard {
        let type_results: Vec<TypeResult> = snapshot
            .types
            .iter()
            .map(|qtype| score_type(qtype, awarded))
            .collect();
        let overall_result = self.overall(&type_results);

        ScoreCard {
            type_results,
            overall_result,
        }
    }

    fn overall(&self, type_results: &[TypeResult]) -> ScoreSummary {
        let raw_score = saturating_sum(type_results.iter().map(|result| result.score.raw_score));
        let max_score = saturating_sum(type_results.iter().map(|result| result.score.max_score));
        let percentage = weighted_mean(
            type_results
                .iter()
                .map(|result| (result.score.percentage, result.weight)),
        );

        ScoreSummary {
            raw_score,
            max_score,
            percentage,
            risk_rating: self.policy.overall_thresholds.rate(percentage),
            grade: self
                .policy
                .overall_grade_scale
                .as_ref()
                .and_then(|scale| scale.classify(percentage)),
        }
    }
}

fn score_group(
    group: &SnapshotGroup,
    awarded: &HashMap<QuestionId, u32>,
    thresholds: Thresholds,
) -> GroupResult {
    let mut raw_score: u32 = 0;
    let mut max_score: u32 = 0;

    for question in &group.questions {
        max_score = max_score.saturating_add(question.options.max_score());
        if let Some(score) = awarded.get(&question.id) {
            raw_score = raw_score.saturating_add(*score);
        }
    }

    let percentage = if max_score > 0 {
        round2(f64::from(raw_score) / f64::from(max_score) * 100.0)
    } else {
        0.0
    };

    GroupResult {
        group_id: group.id,
        group_name: group.name.clone(),
        score: ScoreSummary {
            raw_score,
            max_score,
            percentage,
            risk_rating: thresholds.rate(percentage),
            grade: None,
        },
    }
}

fn score_type(qtype: &SnapshotType, awarded: &HashMap<QuestionId, u32>) -> TypeResult {
    let thresholds = Thresholds::new(qtype.threshold_high, qtype.threshold_medium);
    let groups: Vec<GroupResult> = qtype
        .groups
        .iter()
        .map(|group| score_group(group, awarded, thresholds))
        .collect();

    let raw_score = saturating_sum(groups.iter().map(|group| group.score.raw_score));
    let max_score = saturating_sum(groups.iter().map(|group| group.score.max_score));
    let percentage = weighted_mean(
        groups
            .iter()
            .zip(&qtype.groups)
            .map(|(result, group)| (result.score.percentage, group.weight)),
    );

    TypeResult {
        type_id: qtype.id,
        type_name: qtype.name.clone(),
        weight: qtype.weight,
        score: ScoreSummary {
            raw_score,
            max_score,
            percentage,
            risk_rating: thresholds.rate(percentage),
            grade: qtype
                .grade_scale
                .as_ref()
                .and_then(|scale| scale.classify(percentage)),
        },
        groups,
    }
}

/// Weighted mean of `(value, weight)` pairs rounded to two decimals; 0 when the weights sum to 0.
fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    let (weighted, total_weight) = pairs.fold((0.0, 0.0), |(sum, weights), (value, weight)| {
        (sum + value * weight, weights + weight)
    });

    if total_weight > 0.0 {
        round2(weighted / total_weight)
    } else {
        0.0
    }
}

fn saturating_sum(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0, u32::saturating_add)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
