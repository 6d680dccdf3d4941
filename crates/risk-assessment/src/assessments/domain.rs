use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoring::ScoreCard;
use super::snapshot::Snapshot;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an issued assessment link.
    AssessmentId
);
uuid_id!(RespondentId);
uuid_id!(TypeId);
uuid_id!(GroupId);
uuid_id!(QuestionId);
uuid_id!(AnswerId);
uuid_id!(DraftId);
uuid_id!(
    /// Identifier returned to the respondent right after an upload.
    AttachmentId
);

/// Organization or natural person being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RespondentKind {
    Org,
    Person,
}

/// The two answers every question accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    Yes,
    No,
}

impl OptionKind {
    pub fn label(&self) -> &'static str {
        match self {
            OptionKind::Yes => "YES",
            OptionKind::No => "NO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Pending,
    Completed,
    Expired,
}

impl AssessmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AssessmentStatus::Pending => "PENDING",
            AssessmentStatus::Completed => "COMPLETED",
            AssessmentStatus::Expired => "EXPIRED",
        }
    }
}

/// Why a valid token can no longer be written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClosedReason {
    #[error("assessment link has expired")]
    Expired,
    #[error("assessment has already been completed")]
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    pub id: RespondentId,
    pub external_id: Option<String>,
    pub kind: RespondentKind,
    pub name: String,
    pub registration_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inline respondent payload sent with every assessment-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentInput {
    #[serde(default, alias = "odoo_id")]
    pub external_id: Option<String>,
    pub name: String,
    pub kind: RespondentKind,
    #[serde(default)]
    pub registration_no: Option<String>,
}

/// Stored assessment. `snapshot` never changes after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: AssessmentId,
    pub respondent_id: RespondentId,
    pub token_hash: String,
    pub selected_type_ids: Vec<TypeId>,
    pub snapshot: Snapshot,
    pub expires_at: DateTime<Utc>,
    pub status: AssessmentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Stored status with expiry applied. COMPLETED wins over an elapsed expiry.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AssessmentStatus {
        match self.status {
            AssessmentStatus::Pending if now > self.expires_at => AssessmentStatus::Expired,
            status => status,
        }
    }

    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), ClosedReason> {
        match self.effective_status(now) {
            AssessmentStatus::Pending => Ok(()),
            AssessmentStatus::Completed => Err(ClosedReason::AlreadyCompleted),
            AssessmentStatus::Expired => Err(ClosedReason::Expired),
        }
    }
}

/// One partially filled answer. Nothing here is checked against option rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option: Option<OptionKind>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<AttachmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftData {
    pub answers: Vec<DraftAnswer>,
    #[serde(default)]
    pub current_type_index: Option<u32>,
    #[serde(default)]
    pub current_group_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDraft {
    pub id: DraftId,
    pub assessment_id: AssessmentId,
    pub data: DraftData,
    pub last_saved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Answer as posted on final submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option: Option<OptionKind>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<AttachmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInput {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub contact: ContactInput,
    pub answers: Vec<AnswerInput>,
}

/// Final answer, written once at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub assessment_id: AssessmentId,
    pub question_id: QuestionId,
    pub selected_option: OptionKind,
    pub comment: Option<String>,
    pub attachment_ids: Vec<AttachmentId>,
    pub score_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionContact {
    pub assessment_id: AssessmentId,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub assessment_id: AssessmentId,
    pub question_id: QuestionId,
    pub storage_key: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub answer_id: Option<AnswerId>,
    pub created_at: DateTime<Utc>,
}

/// Everything the PENDING -> COMPLETED transition writes in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSubmission {
    pub assessment_id: AssessmentId,
    pub answers: Vec<Answer>,
    pub contact: SubmissionContact,
    pub scores: ScoreCard,
    pub completed_at: DateTime<Utc>,
}
