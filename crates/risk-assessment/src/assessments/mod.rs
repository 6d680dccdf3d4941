//! Risk assessment workflow: questionnaire catalog, tokenized assessment links,
//! draft autosave, submission scoring and administrative cleanup.

pub mod catalog;
pub mod cleanup;
pub mod clock;
pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub(crate) mod token;
pub mod validation;
pub mod views;

#[cfg(test)]
mod tests;

pub use catalog::{
    CatalogError, CatalogImportError, CatalogImportSummary, CatalogImporter, CatalogRow,
    CatalogService, OptionRule, Question, QuestionGroup, QuestionOptions, QuestionnaireType,
};
pub use cleanup::{
    CleanupError, CleanupService, DraftCleanupReport, DraftCleanupRequest, ImageCleanupReport,
    ImageCleanupRequest,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    AnswerInput, AssessmentId, AssessmentStatus, ContactInput, DraftAnswer, DraftData, OptionKind,
    QuestionId, RespondentId, RespondentInput, RespondentKind, SubmissionRequest, TypeId,
};
pub use memory::InMemorySurveyStore;
pub use repository::{RepositoryError, SurveyStore};
pub use router::{survey_router, SurveyState};
pub use scoring::{GradeScale, RiskRating, ScoreCard, ScoringEngine, ScoringPolicy};
pub use service::{AssessmentError, AssessmentService, AssessmentSettings, CreateAssessmentRequest};
pub use validation::{IssueCode, ValidationIssue};
