use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AssessmentDraft, AssessmentId, AssessmentRecord, AssessmentStatus, Attachment, AttachmentId,
    DraftAnswer, GroupId, OptionKind, QuestionId, Respondent, RespondentId, SubmissionContact,
    TypeId,
};
use super::scoring::{ScoreCard, ScoreSummary, TypeResult};
use super::snapshot::SnapshotType;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Returned once at creation; `url` carries the only copy of the plaintext token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedAssessment {
    pub id: AssessmentId,
    pub respondent_id: RespondentId,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftView {
    pub answers: Vec<DraftAnswer>,
    pub current_type_index: Option<u32>,
    pub current_group_index: Option<u32>,
    pub last_saved_at: DateTime<Utc>,
}

impl From<AssessmentDraft> for DraftView {
    fn from(draft: AssessmentDraft) -> Self {
        Self {
            answers: draft.data.answers,
            current_type_index: draft.data.current_type_index,
            current_group_index: draft.data.current_group_index,
            last_saved_at: draft.last_saved_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSaved {
    pub last_saved_at: DateTime<Utc>,
    pub message: String,
}

/// What a respondent sees when opening a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentForm {
    pub id: AssessmentId,
    pub respondent_name: String,
    pub expires_at: DateTime<Utc>,
    pub types: Vec<SnapshotType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    pub id: AttachmentId,
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl From<Attachment> for UploadedAttachment {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            original_name: attachment.original_name,
            size_bytes: attachment.size_bytes,
            mime_type: attachment.mime_type,
        }
    }
}

/// Response of a successful submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub assessment_id: AssessmentId,
    pub type_results: Vec<TypeResult>,
    pub overall_result: ScoreSummary,
}

impl ScoreReport {
    pub fn new(assessment_id: AssessmentId, scores: ScoreCard) -> Self {
        Self {
            assessment_id,
            type_results: scores.type_results,
            overall_result: scores.overall_result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactView {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
}

impl From<SubmissionContact> for ContactView {
    fn from(contact: SubmissionContact) -> Self {
        Self {
            last_name: contact.last_name,
            first_name: contact.first_name,
            email: contact.email,
            phone: contact.phone,
            position: contact.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerBreakdown {
    pub question_id: QuestionId,
    pub question_text: String,
    pub type_id: TypeId,
    pub type_name: String,
    pub group_id: GroupId,
    pub group_name: String,
    pub selected_option: OptionKind,
    pub comment: Option<String>,
    pub score_awarded: u32,
    pub max_score: u32,
    pub attachment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResults {
    pub assessment_id: AssessmentId,
    pub respondent_id: RespondentId,
    pub respondent_name: String,
    pub status: AssessmentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub contact: Option<ContactView>,
    pub type_results: Vec<TypeResult>,
    pub overall_result: ScoreSummary,
    pub overall_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_breakdown: Option<Vec<AnswerBreakdown>>,
}

/// Admin listing row. `status` is the effective status at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentView {
    pub id: AssessmentId,
    pub respondent_id: RespondentId,
    pub respondent_odoo_id: Option<String>,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub selected_type_ids: Vec<TypeId>,
    pub expires_at: DateTime<Utc>,
    pub status: AssessmentStatus,
    pub status_label: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AssessmentView {
    pub fn new(
        record: AssessmentRecord,
        respondent: Option<&Respondent>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = record.effective_status(now);
        Self {
            id: record.id,
            respondent_id: record.respondent_id,
            respondent_odoo_id: respondent.and_then(|respondent| respondent.external_id.clone()),
            employee_id: record.employee_id,
            employee_name: record.employee_name,
            selected_type_ids: record.selected_type_ids,
            expires_at: record.expires_at,
            status,
            status_label: status.label().to_string(),
            completed_at: record.completed_at,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Result<Self, String> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err("page must be at least 1".to_string());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(format!("page_size must be between 1 and {MAX_PAGE_SIZE}"));
        }
        Ok(Self { page, page_size })
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Slices an already filtered and ordered result set.
    pub fn from_items(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let pages = total.div_ceil(request.page_size as usize) as u32;
        let items = items
            .into_iter()
            .skip(request.offset())
            .take(request.page_size as usize)
            .collect();

        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            pages,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::from_items(Vec::new(), request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_slices_and_counts_pages() {
        let request = PageRequest::new(Some(3), Some(20)).expect("valid");
        let page = Page::from_items((1..=45).collect::<Vec<u32>>(), request);

        assert_eq!(page.items, vec![41, 42, 43, 44, 45]);
        assert_eq!(page.total, 45);
        assert_eq!(page.pages, 3);
    }

    #[test]
    fn page_request_enforces_bounds() {
        assert!(PageRequest::new(Some(0), None).is_err());
        assert!(PageRequest::new(None, Some(101)).is_err());
        assert_eq!(PageRequest::new(None, None), Ok(PageRequest::default()));
    }

    #[test]
    fn empty_page_has_zero_pages() {
        let page: Page<u32> = Page::empty(PageRequest::default());
        assert_eq!(page.pages, 0);
        assert!(page.items.is_empty());
    }
}
