//! Questionnaire catalog: types own groups, groups own questions, and every
//! question carries one scoring rule per answer option.
//!
//! Catalog rows are only ever soft-deleted. Issued assessments read their own
//! snapshot, so nothing in this module can change an assessment already handed out.

pub mod import;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::{GroupId, OptionKind, QuestionId, TypeId};
use super::repository::{CatalogRepository, RepositoryError};
use super::scoring::{GradeScale, DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_MEDIUM};

pub use import::{CatalogImportError, CatalogImportSummary, CatalogImporter, CatalogRow};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_QUESTION_TEXT_LEN: usize = 2000;
pub const MAX_COMMENT_MIN_LEN: u32 = 2000;
pub const MAX_OPTION_SCORE: u32 = 1_000_000;
pub const MAX_WEIGHT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringMethod {
    #[default]
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireType {
    pub id: TypeId,
    pub name: String,
    pub scoring_method: ScoringMethod,
    pub threshold_high: u8,
    pub threshold_medium: u8,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_scale: Option<GradeScale>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub id: GroupId,
    pub type_id: TypeId,
    pub name: String,
    pub display_order: u32,
    pub weight: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub group_id: GroupId,
    pub text: String,
    pub display_order: u32,
    pub weight: f64,
    pub is_critical: bool,
    pub is_active: bool,
    pub options: QuestionOptions,
}

/// Scoring and evidence requirements applied when an option is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionRule {
    pub score: u32,
    pub require_comment: bool,
    pub require_image: bool,
    pub comment_min_len: u32,
    pub max_images: u32,
    pub image_max_mb: u32,
}

impl Default for OptionRule {
    fn default() -> Self {
        Self {
            score: 0,
            require_comment: false,
            require_image: false,
            comment_min_len: 0,
            max_images: 3,
            image_max_mb: 5,
        }
    }
}

impl OptionRule {
    pub fn scored(score: u32) -> Self {
        Self {
            score,
            ..Self::default()
        }
    }

    fn validate(&self, kind: OptionKind) -> Result<(), CatalogError> {
        let label = kind.label();
        if self.score > MAX_OPTION_SCORE {
            return Err(CatalogError::Invalid(format!(
                "{label}: score must be at most {MAX_OPTION_SCORE}"
            )));
        }
        if self.comment_min_len > MAX_COMMENT_MIN_LEN {
            return Err(CatalogError::Invalid(format!(
                "{label}: comment_min_len must be at most {MAX_COMMENT_MIN_LEN}"
            )));
        }
        if self.comment_min_len > 0 && !self.require_comment {
            return Err(CatalogError::Invalid(format!(
                "{label}: comment_min_len can only be set when require_comment is true"
            )));
        }
        if !(1..=10).contains(&self.max_images) {
            return Err(CatalogError::Invalid(format!(
                "{label}: max_images must be between 1 and 10"
            )));
        }
        if !(1..=20).contains(&self.image_max_mb) {
            return Err(CatalogError::Invalid(format!(
                "{label}: image_max_mb must be between 1 and 20"
            )));
        }
        Ok(())
    }
}

/// The YES and NO rules of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "YES", alias = "yes")]
    pub yes: OptionRule,
    #[serde(rename = "NO", alias = "no")]
    pub no: OptionRule,
}

impl QuestionOptions {
    pub fn new(yes: OptionRule, no: OptionRule) -> Self {
        Self { yes, no }
    }

    pub fn rule(&self, kind: OptionKind) -> &OptionRule {
        match kind {
            OptionKind::Yes => &self.yes,
            OptionKind::No => &self.no,
        }
    }

    pub fn max_score(&self) -> u32 {
        self.yes.score.max(self.no.score)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        self.yes.validate(OptionKind::Yes)?;
        self.no.validate(OptionKind::No)
    }
}

fn default_threshold_high() -> u8 {
    DEFAULT_THRESHOLD_HIGH
}

fn default_threshold_medium() -> u8 {
    DEFAULT_THRESHOLD_MEDIUM
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestionnaireType {
    pub name: String,
    #[serde(default)]
    pub scoring_method: ScoringMethod,
    #[serde(default = "default_threshold_high")]
    pub threshold_high: u8,
    #[serde(default = "default_threshold_medium")]
    pub threshold_medium: u8,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub grade_scale: Option<GradeScale>,
}

impl NewQuestionnaireType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scoring_method: ScoringMethod::Sum,
            threshold_high: DEFAULT_THRESHOLD_HIGH,
            threshold_medium: DEFAULT_THRESHOLD_MEDIUM,
            weight: default_weight(),
            grade_scale: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireTypeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub threshold_high: Option<u8>,
    #[serde(default)]
    pub threshold_medium: Option<u8>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub grade_scale: Option<GradeScale>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestionGroup {
    pub name: String,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionGroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_order: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub is_critical: bool,
    pub options: QuestionOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionUpdate {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub display_order: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A type together with all of its groups, as returned by the admin detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDetail {
    #[serde(flatten)]
    pub questionnaire_type: QuestionnaireType,
    pub groups: Vec<GroupDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: QuestionGroup,
    pub questions: Vec<Question>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn validate_name(field: &str, value: &str, max: usize) -> Result<(), CatalogError> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        return Err(CatalogError::Invalid(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

fn validate_weight(field: &str, weight: f64) -> Result<(), CatalogError> {
    if !(weight > 0.0 && weight <= MAX_WEIGHT) {
        return Err(CatalogError::Invalid(format!(
            "{field} must be greater than 0 and at most {MAX_WEIGHT}"
        )));
    }
    Ok(())
}

fn validate_thresholds(high: u8, medium: u8) -> Result<(), CatalogError> {
    if high > 100 || medium > 100 {
        return Err(CatalogError::Invalid(
            "thresholds must be between 0 and 100".to_string(),
        ));
    }
    if medium >= high {
        return Err(CatalogError::Invalid(
            "threshold_medium must be lower than threshold_high".to_string(),
        ));
    }
    Ok(())
}

/// Admin operations over the questionnaire catalog.
pub struct CatalogService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> CatalogService<R>
where
    R: CatalogRepository + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn create_type(
        &self,
        input: NewQuestionnaireType,
    ) -> Result<QuestionnaireType, CatalogError> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        validate_thresholds(input.threshold_high, input.threshold_medium)?;
        validate_weight("weight", input.weight)?;

        let now = self.clock.now();
        let record = QuestionnaireType {
            id: TypeId::new(),
            name: input.name.trim().to_string(),
            scoring_method: input.scoring_method,
            threshold_high: input.threshold_high,
            threshold_medium: input.threshold_medium,
            weight: input.weight,
            grade_scale: input.grade_scale,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_type(record)?;
        info!(type_id = %stored.id, name = %stored.name, "questionnaire type created");
        Ok(stored)
    }

    pub fn list_types(&self, active_only: bool) -> Result<Vec<QuestionnaireType>, CatalogError> {
        Ok(self.repository.list_types(active_only)?)
    }

    pub fn get_type(&self, id: &TypeId) -> Result<QuestionnaireType, CatalogError> {
        self.repository
            .fetch_type(id)?
            .ok_or(CatalogError::NotFound("questionnaire type"))
    }

    /// Type with every group and question, inactive ones included.
    pub fn type_detail(&self, id: &TypeId) -> Result<TypeDetail, CatalogError> {
        let questionnaire_type = self.get_type(id)?;
        let groups = self
            .repository
            .groups_for_type(id)?
            .into_iter()
            .map(|group| {
                let questions = self.repository.questions_for_group(&group.id)?;
                Ok(GroupDetail { group, questions })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(TypeDetail {
            questionnaire_type,
            groups,
        })
    }

    pub fn update_type(
        &self,
        id: &TypeId,
        update: QuestionnaireTypeUpdate,
    ) -> Result<QuestionnaireType, CatalogError> {
        let mut record = self.get_type(id)?;

        if let Some(name) = update.name {
            validate_name("name", &name, MAX_NAME_LEN)?;
            record.name = name.trim().to_string();
        }
        let high = update.threshold_high.unwrap_or(record.threshold_high);
        let medium = update.threshold_medium.unwrap_or(record.threshold_medium);
        validate_thresholds(high, medium)?;
        record.threshold_high = high;
        record.threshold_medium = medium;
        if let Some(weight) = update.weight {
            validate_weight("weight", weight)?;
            record.weight = weight;
        }
        if let Some(scale) = update.grade_scale {
            record.grade_scale = Some(scale);
        }
        if let Some(is_active) = update.is_active {
            record.is_active = is_active;
        }
        record.updated_at = self.clock.now();

        self.repository.update_type(record.clone())?;
        Ok(record)
    }

    pub fn deactivate_type(&self, id: &TypeId) -> Result<QuestionnaireType, CatalogError> {
        let record = self.update_type(
            id,
            QuestionnaireTypeUpdate {
                is_active: Some(false),
                ..QuestionnaireTypeUpdate::default()
            },
        )?;
        info!(type_id = %id, "questionnaire type deactivated");
        Ok(record)
    }

    pub fn create_group(
        &self,
        type_id: &TypeId,
        input: NewQuestionGroup,
    ) -> Result<QuestionGroup, CatalogError> {
        self.get_type(type_id)?;
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        validate_weight("weight", input.weight)?;

        let now = self.clock.now();
        let group = QuestionGroup {
            id: GroupId::new(),
            type_id: *type_id,
            name: input.name.trim().to_string(),
            display_order: input.display_order,
            weight: input.weight,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        Ok(self.repository.insert_group(group)?)
    }

    pub fn list_groups(&self, type_id: &TypeId) -> Result<Vec<QuestionGroup>, CatalogError> {
        self.get_type(type_id)?;
        Ok(self.repository.groups_for_type(type_id)?)
    }

    pub fn get_group(&self, id: &GroupId) -> Result<QuestionGroup, CatalogError> {
        self.repository
            .fetch_group(id)?
            .ok_or(CatalogError::NotFound("question group"))
    }

    pub fn update_group(
        &self,
        id: &GroupId,
        update: QuestionGroupUpdate,
    ) -> Result<QuestionGroup, CatalogError> {
        let mut group = self.get_group(id)?;

        if let Some(name) = update.name {
            validate_name("name", &name, MAX_NAME_LEN)?;
            group.name = name.trim().to_string();
        }
        if let Some(display_order) = update.display_order {
            group.display_order = display_order;
        }
        if let Some(weight) = update.weight {
            validate_weight("weight", weight)?;
            group.weight = weight;
        }
        if let Some(is_active) = update.is_active {
            group.is_active = is_active;
        }
        group.updated_at = self.clock.now();

        self.repository.update_group(group.clone())?;
        Ok(group)
    }

    pub fn deactivate_group(&self, id: &GroupId) -> Result<QuestionGroup, CatalogError> {
        self.update_group(
            id,
            QuestionGroupUpdate {
                is_active: Some(false),
                ..QuestionGroupUpdate::default()
            },
        )
    }

    pub fn create_question(
        &self,
        group_id: &GroupId,
        input: NewQuestion,
    ) -> Result<Question, CatalogError> {
        self.get_group(group_id)?;
        validate_name("text", &input.text, MAX_QUESTION_TEXT_LEN)?;
        validate_weight("weight", input.weight)?;
        input.options.validate()?;

        let question = Question {
            id: QuestionId::new(),
            group_id: *group_id,
            text: input.text.trim().to_string(),
            display_order: input.display_order,
            weight: input.weight,
            is_critical: input.is_critical,
            is_active: true,
            options: input.options,
        };

        Ok(self.repository.insert_question(question)?)
    }

    pub fn list_questions(&self, group_id: &GroupId) -> Result<Vec<Question>, CatalogError> {
        self.get_group(group_id)?;
        Ok(self.repository.questions_for_group(group_id)?)
    }

    pub fn get_question(&self, id: &QuestionId) -> Result<Question, CatalogError> {
        self.repository
            .fetch_question(id)?
            .ok_or(CatalogError::NotFound("question"))
    }

    pub fn update_question(
        &self,
        id: &QuestionId,
        update: QuestionUpdate,
    ) -> Result<Question, CatalogError> {
        let mut question = self.get_question(id)?;

        if let Some(text) = update.text {
            validate_name("text", &text, MAX_QUESTION_TEXT_LEN)?;
            question.text = text.trim().to_string();
        }
        if let Some(display_order) = update.display_order {
            question.display_order = display_order;
        }
        if let Some(weight) = update.weight {
            validate_weight("weight", weight)?;
            question.weight = weight;
        }
        if let Some(is_critical) = update.is_critical {
            question.is_critical = is_critical;
        }
        if let Some(is_active) = update.is_active {
            question.is_active = is_active;
        }

        self.repository.update_question(question.clone())?;
        Ok(question)
    }

    pub fn deactivate_question(&self, id: &QuestionId) -> Result<Question, CatalogError> {
        self.update_question(
            id,
            QuestionUpdate {
                is_active: Some(false),
                ..QuestionUpdate::default()
            },
        )
    }

    /// Replaces both option rules at once.
    pub fn set_options(
        &self,
        id: &QuestionId,
        options: QuestionOptions,
    ) -> Result<Question, CatalogError> {
        options.validate()?;
        let mut question = self.get_question(id)?;
        question.options = options;
        self.repository.update_question(question.clone())?;
        Ok(question)
    }

    /// Seeds the catalog from parsed CSV rows. Rows sharing a type and group
    /// name land in the same group; display order follows row order.
    pub fn import(&self, rows: Vec<CatalogRow>) -> Result<CatalogImportSummary, CatalogError> {
        let plan = import::plan(rows)?;
        let mut summary = CatalogImportSummary::default();

        for planned_type in plan {
            let qtype = self.create_type(NewQuestionnaireType::named(planned_type.name))?;
            summary.types += 1;

            for (group_order, planned_group) in planned_type.groups.into_iter().enumerate() {
                let group = self.create_group(
                    &qtype.id,
                    NewQuestionGroup {
                        name: planned_group.name,
                        display_order: group_order as u32,
                        weight: default_weight(),
                    },
                )?;
                summary.groups += 1;

                for (question_order, planned_question) in
                    planned_group.questions.into_iter().enumerate()
                {
                    self.create_question(
                        &group.id,
                        NewQuestion {
                            text: planned_question.text,
                            display_order: question_order as u32,
                            weight: default_weight(),
                            is_critical: false,
                            options: planned_question.options,
                        },
                    )?;
                    summary.questions += 1;
                }
            }
        }

        info!(
            types = summary.types,
            groups = summary.groups,
            questions = summary.questions,
            "catalog imported"
        );
        Ok(summary)
    }
}
