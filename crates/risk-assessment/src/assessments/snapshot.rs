use serde::{Deserialize, Serialize};

use super::catalog::{Question, QuestionGroup, QuestionOptions, QuestionnaireType};
use super::domain::{GroupId, QuestionId, TypeId};
use super::scoring::GradeScale;

/// Frozen copy of the questionnaire content an assessment was issued with.
///
/// Answers, validation, and scoring always resolve questions through the
/// snapshot so catalog edits made after issuance never leak into a live link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub types: Vec<SnapshotType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotType {
    pub id: TypeId,
    pub name: String,
    pub threshold_high: u8,
    pub threshold_medium: u8,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_scale: Option<GradeScale>,
    pub groups: Vec<SnapshotGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub id: GroupId,
    pub name: String,
    pub display_order: u32,
    pub weight: f64,
    pub questions: Vec<SnapshotQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotQuestion {
    pub id: QuestionId,
    pub text: String,
    pub display_order: u32,
    pub weight: f64,
    pub is_critical: bool,
    pub options: QuestionOptions,
}

impl Snapshot {
    pub fn question_count(&self) -> usize {
        self.types
            .iter()
            .flat_map(|qtype| qtype.groups.iter())
            .map(|group| group.questions.len())
            .sum()
    }

    /// Every question in display order together with its owning type and group.
    pub fn questions(
        &self,
    ) -> impl Iterator<Item = (&SnapshotType, &SnapshotGroup, &SnapshotQuestion)> + '_ {
        self.types.iter().flat_map(|qtype| {
            qtype.groups.iter().flat_map(move |group| {
                group
                    .questions
                    .iter()
                    .map(move |question| (qtype, group, question))
            })
        })
    }

    pub fn question(&self, id: &QuestionId) -> Option<&SnapshotQuestion> {
        self.questions()
            .map(|(_, _, question)| question)
            .find(|question| &question.id == id)
    }
}

impl SnapshotType {
    /// Copies a catalog type with its active groups and questions, ordered for display.
    pub(crate) fn capture(
        qtype: &QuestionnaireType,
        groups: Vec<(QuestionGroup, Vec<Question>)>,
    ) -> Self {
        let mut snapshot_groups: Vec<SnapshotGroup> = groups
            .into_iter()
            .filter(|(group, _)| group.is_active)
            .map(|(group, questions)| {
                let mut snapshot_questions: Vec<SnapshotQuestion> = questions
                    .into_iter()
                    .filter(|question| question.is_active)
                    .map(|question| SnapshotQuestion {
                        id: question.id,
                        text: question.text,
                        display_order: question.display_order,
                        weight: question.weight,
                        is_critical: question.is_critical,
                        options: question.options,
                    })
                    .collect();
                snapshot_questions.sort_by_key(|question| question.display_order);

                SnapshotGroup {
                    id: group.id,
                    name: group.name,
                    display_order: group.display_order,
                    weight: group.weight,
                    questions: snapshot_questions,
                }
            })
            .collect();
        snapshot_groups.sort_by_key(|group| group.display_order);

        Self {
            id: qtype.id,
            name: qtype.name.clone(),
            threshold_high: qtype.threshold_high,
            threshold_medium: qtype.threshold_medium,
            weight: qtype.weight,
            grade_scale: qtype.grade_scale.clone(),
            groups: snapshot_groups,
        }
    }
}
