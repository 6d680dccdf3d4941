use chrono::{DateTime, Utc};

use super::catalog::{Question, QuestionGroup, QuestionnaireType};
use super::domain::{
    AssessmentDraft, AssessmentId, AssessmentRecord, Attachment, AttachmentId, ClosedReason,
    CompletedSubmission, DraftData, GroupId, QuestionId, Respondent, RespondentId,
    RespondentInput, RespondentKind, TypeId,
};

/// Storage for the questionnaire catalog.
pub trait CatalogRepository: Send + Sync {
    fn insert_type(&self, record: QuestionnaireType)
        -> Result<QuestionnaireType, RepositoryError>;
    fn update_type(&self, record: QuestionnaireType) -> Result<(), RepositoryError>;
    fn fetch_type(&self, id: &TypeId) -> Result<Option<QuestionnaireType>, RepositoryError>;
    /// Ordered by creation time.
    fn list_types(&self, active_only: bool) -> Result<Vec<QuestionnaireType>, RepositoryError>;

    fn insert_group(&self, group: QuestionGroup) -> Result<QuestionGroup, RepositoryError>;
    fn update_group(&self, group: QuestionGroup) -> Result<(), RepositoryError>;
    fn fetch_group(&self, id: &GroupId) -> Result<Option<QuestionGroup>, RepositoryError>;
    /// Ordered by display order.
    fn groups_for_type(&self, type_id: &TypeId) -> Result<Vec<QuestionGroup>, RepositoryError>;

    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError>;
    fn update_question(&self, question: Question) -> Result<(), RepositoryError>;
    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError>;
    /// Ordered by display order.
    fn questions_for_group(&self, group_id: &GroupId) -> Result<Vec<Question>, RepositoryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespondentFilter {
    pub kind: Option<RespondentKind>,
    /// Case-insensitive substring of the respondent name.
    pub search: Option<String>,
}

pub trait RespondentRepository: Send + Sync {
    /// Resolves or creates the respondent in one guarded step: by external id,
    /// then by `(kind, registration_no)` among rows without an external id,
    /// otherwise a new row.
    fn upsert_respondent(
        &self,
        input: RespondentInput,
        now: DateTime<Utc>,
    ) -> Result<Respondent, RepositoryError>;
    fn fetch_respondent(&self, id: &RespondentId) -> Result<Option<Respondent>, RepositoryError>;
    fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<Respondent>, RepositoryError>;
    /// Ordered by name.
    fn list_respondents(
        &self,
        filter: &RespondentFilter,
    ) -> Result<Vec<Respondent>, RepositoryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentFilter {
    pub respondent_id: Option<RespondentId>,
    pub employee_id: Option<String>,
}

pub trait AssessmentRepository: Send + Sync {
    fn insert_assessment(
        &self,
        record: AssessmentRecord,
    ) -> Result<AssessmentRecord, RepositoryError>;
    fn fetch_assessment(
        &self,
        id: &AssessmentId,
    ) -> Result<Option<AssessmentRecord>, RepositoryError>;
    fn fetch_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AssessmentRecord>, RepositoryError>;
    /// Newest first.
    fn list_assessments(
        &self,
        filter: &AssessmentFilter,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError>;

    fn fetch_draft(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<AssessmentDraft>, RepositoryError>;
    /// Replaces the draft wholesale. The open check and the write share one guard,
    /// so a save racing a committed submit fails with `Closed(AlreadyCompleted)`.
    fn upsert_draft(
        &self,
        assessment_id: &AssessmentId,
        data: DraftData,
        now: DateTime<Utc>,
    ) -> Result<AssessmentDraft, RepositoryError>;

    /// Applies the PENDING -> COMPLETED transition atomically: answers, contact
    /// and scores are stored, attachments linked, the draft removed. Every
    /// referenced attachment must still belong to its answer's question.
    fn complete(&self, submission: CompletedSubmission) -> Result<(), RepositoryError>;
    fn fetch_submission(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<CompletedSubmission>, RepositoryError>;

    /// Drafts of non-completed assessments whose expiry is before `expired_before`.
    fn stale_drafts(
        &self,
        expired_before: DateTime<Utc>,
    ) -> Result<Vec<(AssessmentDraft, AssessmentRecord)>, RepositoryError>;
    fn delete_drafts(&self, assessment_ids: &[AssessmentId]) -> Result<usize, RepositoryError>;
}

/// Uploaded images. Bytes are kept under `storage_key`.
pub trait AttachmentStore: Send + Sync {
    fn save_attachment(
        &self,
        attachment: Attachment,
        bytes: Vec<u8>,
    ) -> Result<Attachment, RepositoryError>;
    fn fetch_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>, RepositoryError>;
    fn attachments_for_assessment(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Vec<Attachment>, RepositoryError>;
    /// Attachments never linked to an answer and created before `created_before`.
    fn unlinked_attachments(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, RepositoryError>;
    /// Removes metadata and bytes, returning what was actually deleted.
    fn delete_attachments(&self, ids: &[AttachmentId])
        -> Result<Vec<Attachment>, RepositoryError>;
}

/// Everything the assessment services need from one backing store.
pub trait SurveyStore:
    CatalogRepository + RespondentRepository + AssessmentRepository + AttachmentStore
{
}

impl<T> SurveyStore for T where
    T: CatalogRepository + RespondentRepository + AssessmentRepository + AttachmentStore
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Closed(#[from] ClosedReason),
    #[error("attachment {attachment_id} is not available for question {question_id}")]
    AttachmentMissing {
        question_id: QuestionId,
        attachment_id: AttachmentId,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
