use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::domain::{
    Answer, AnswerId, AssessmentId, AssessmentRecord, AssessmentStatus, Attachment, AttachmentId,
    ClosedReason, CompletedSubmission, DraftData, QuestionId, Respondent, RespondentId,
    RespondentInput, SubmissionContact, SubmissionRequest, TypeId,
};
use super::repository::{AssessmentFilter, RepositoryError, RespondentFilter, SurveyStore};
use super::scoring::{ScoringEngine, ScoringPolicy};
use super::snapshot::{Snapshot, SnapshotType};
use super::token;
use super::validation::{validate_submission, ValidationIssue};
use super::views::{
    AnswerBreakdown, AssessmentForm, AssessmentResults, AssessmentView, CreatedAssessment,
    DraftSaved, DraftView, Page, PageRequest, ScoreReport, UploadedAttachment,
};

pub const DRAFT_SAVED_MESSAGE: &str = "Хадгалагдсан";
pub const MAX_EXPIRY_DAYS: u32 = 365;
pub const MAX_FILE_NAME_LEN: usize = 255;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Runtime knobs injected from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSettings {
    pub public_url: String,
    pub default_expiry_days: u32,
    pub upload_max_mb: u32,
    pub scoring: ScoringPolicy,
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:5173".to_string(),
            default_expiry_days: 30,
            upload_max_mb: 5,
            scoring: ScoringPolicy::default(),
        }
    }
}

impl AssessmentSettings {
    fn upload_max_bytes(&self) -> u64 {
        u64::from(self.upload_max_mb) * 1024 * 1024
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub respondent: RespondentInput,
    pub selected_type_ids: Vec<TypeId>,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
}

/// One uploaded file as received from the respondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub question_id: QuestionId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentQuery {
    #[serde(default)]
    pub odoo_id: Option<String>,
    #[serde(default)]
    pub respondent_id: Option<RespondentId>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
}

/// Assessment lifecycle: issuing links, drafts, uploads, submission and results.
pub struct AssessmentService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    engine: ScoringEngine,
    settings: AssessmentSettings,
}

impl<S> AssessmentService<S>
where
    S: SurveyStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: AssessmentSettings) -> Self {
        let engine = ScoringEngine::new(settings.scoring.clone());
        Self {
            store,
            clock,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    /// Upserts the respondent, freezes the selected catalog types into a
    /// snapshot, and issues a fresh link.
    pub fn create_assessment(
        &self,
        request: CreateAssessmentRequest,
    ) -> Result<CreatedAssessment, AssessmentError> {
        let name_len = request.respondent.name.trim().chars().count();
        if name_len == 0 || name_len > 300 {
            return Err(AssessmentError::InvalidRequest(
                "respondent name must be between 1 and 300 characters".to_string(),
            ));
        }
        if request.selected_type_ids.is_empty() {
            return Err(AssessmentError::InvalidRequest(
                "at least one questionnaire type must be selected".to_string(),
            ));
        }
        let expires_in_days = request
            .expires_in_days
            .unwrap_or(self.settings.default_expiry_days);
        if !(1..=MAX_EXPIRY_DAYS).contains(&expires_in_days) {
            return Err(AssessmentError::InvalidRequest(format!(
                "expires_in_days must be between 1 and {MAX_EXPIRY_DAYS}"
            )));
        }

        let mut selected_type_ids = Vec::with_capacity(request.selected_type_ids.len());
        for type_id in request.selected_type_ids {
            if !selected_type_ids.contains(&type_id) {
                selected_type_ids.push(type_id);
            }
        }
        let snapshot = self.build_snapshot(&selected_type_ids)?;
        if snapshot.question_count() == 0 {
            return Err(AssessmentError::InvalidRequest(
                "Selected questionnaire types have no active questions".to_string(),
            ));
        }

        let now = self.clock.now();
        let respondent = self.store.upsert_respondent(request.respondent, now)?;
        let issued = token::generate();
        let expires_at = now + Duration::days(i64::from(expires_in_days));

        let record = AssessmentRecord {
            id: AssessmentId::new(),
            respondent_id: respondent.id,
            token_hash: issued.hash,
            selected_type_ids,
            snapshot,
            expires_at,
            status: AssessmentStatus::Pending,
            completed_at: None,
            employee_id: request.employee_id,
            employee_name: request.employee_name,
            created_at: now,
        };
        let stored = self.store.insert_assessment(record)?;

        info!(
            assessment_id = %stored.id,
            respondent_id = %respondent.id,
            questions = stored.snapshot.question_count(),
            %expires_at,
            "assessment created"
        );

        Ok(CreatedAssessment {
            id: stored.id,
            respondent_id: respondent.id,
            url: format!(
                "{}/a/{}",
                self.settings.public_url.trim_end_matches('/'),
                issued.token
            ),
            expires_at,
        })
    }

    fn build_snapshot(&self, type_ids: &[TypeId]) -> Result<Snapshot, AssessmentError> {
        let mut types = Vec::with_capacity(type_ids.len());
        for type_id in type_ids {
            let qtype = self
                .store
                .fetch_type(type_id)?
                .filter(|qtype| qtype.is_active)
                .ok_or_else(|| {
                    AssessmentError::InvalidRequest(format!(
                        "questionnaire type {type_id} not found or inactive"
                    ))
                })?;
            let groups = self
                .store
                .groups_for_type(type_id)?
                .into_iter()
                .map(|group| {
                    let questions = self.store.questions_for_group(&group.id)?;
                    Ok((group, questions))
                })
                .collect::<Result<Vec<_>, RepositoryError>>()?;
            types.push(SnapshotType::capture(&qtype, groups));
        }
        Ok(Snapshot { types })
    }

    fn resolve(&self, token: &str) -> Result<AssessmentRecord, AssessmentError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AssessmentError::NotFound);
        }
        self.store
            .fetch_by_token_hash(&token::hash_token(token))?
            .ok_or(AssessmentError::NotFound)
    }

    fn resolve_open(&self, token: &str) -> Result<AssessmentRecord, AssessmentError> {
        let record = self.resolve(token)?;
        record.ensure_open(self.clock.now())?;
        Ok(record)
    }

    /// Fails the way any respondent call would for a link that cannot be used.
    pub fn check_token(&self, token: &str) -> Result<(), AssessmentError> {
        self.resolve_open(token).map(|_| ())
    }

    pub fn fetch_form(&self, token: &str) -> Result<AssessmentForm, AssessmentError> {
        let record = self.resolve_open(token)?;
        let respondent_name = self
            .store
            .fetch_respondent(&record.respondent_id)?
            .map(|respondent| respondent.name)
            .unwrap_or_default();
        let draft = self.store.fetch_draft(&record.id)?.map(DraftView::from);

        Ok(AssessmentForm {
            id: record.id,
            respondent_name,
            expires_at: record.expires_at,
            types: record.snapshot.types,
            draft,
        })
    }

    pub fn load_draft(&self, token: &str) -> Result<Option<DraftView>, AssessmentError> {
        let record = self.resolve_open(token)?;
        Ok(self.store.fetch_draft(&record.id)?.map(DraftView::from))
    }

    /// Last write wins. The open check happens inside the store write.
    pub fn save_draft(&self, token: &str, data: DraftData) -> Result<DraftSaved, AssessmentError> {
        let record = self.resolve(token)?;
        let draft = self
            .store
            .upsert_draft(&record.id, data, self.clock.now())?;

        debug!(
            assessment_id = %record.id,
            answers = draft.data.answers.len(),
            "draft saved"
        );
        Ok(DraftSaved {
            last_saved_at: draft.last_saved_at,
            message: DRAFT_SAVED_MESSAGE.to_string(),
        })
    }

    pub fn upload_attachment(
        &self,
        token: &str,
        upload: UploadRequest,
    ) -> Result<UploadedAttachment, AssessmentError> {
        let record = self.resolve_open(token)?;
        if record.snapshot.question(&upload.question_id).is_none() {
            return Err(AssessmentError::InvalidRequest(format!(
                "Question {} not found in assessment",
                upload.question_id
            )));
        }

        let original_name = upload
            .file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let name_len = original_name.chars().count();
        if name_len == 0 || name_len > MAX_FILE_NAME_LEN {
            return Err(AssessmentError::InvalidRequest(
                "Invalid filename".to_string(),
            ));
        }

        let mime_type = resolve_mime_type(upload.content_type.as_deref(), &original_name);
        if !ALLOWED_IMAGE_TYPES.contains(&mime_type.as_str()) {
            return Err(AssessmentError::InvalidRequest(format!(
                "Invalid file type: {mime_type}. Allowed: JPEG, PNG, GIF, WebP"
            )));
        }

        let size_bytes = upload.bytes.len() as u64;
        if size_bytes == 0 {
            return Err(AssessmentError::InvalidRequest("File is empty".to_string()));
        }
        if size_bytes > self.settings.upload_max_bytes() {
            return Err(AssessmentError::InvalidRequest(format!(
                "File too large: {size_bytes} bytes. Maximum: {}MB",
                self.settings.upload_max_mb
            )));
        }

        let id = AttachmentId::new();
        let extension = mime_guess::get_mime_extensions_str(&mime_type)
            .and_then(|extensions| extensions.first())
            .copied()
            .unwrap_or("bin");
        let attachment = Attachment {
            id,
            assessment_id: record.id,
            question_id: upload.question_id,
            storage_key: format!(
                "assessments/{}/{}/{}.{}",
                record.id, upload.question_id, id, extension
            ),
            original_name,
            size_bytes,
            mime_type,
            answer_id: None,
            created_at: self.clock.now(),
        };
        let stored = self.store.save_attachment(attachment, upload.bytes)?;

        info!(
            assessment_id = %record.id,
            attachment_id = %stored.id,
            size_bytes,
            "attachment uploaded"
        );
        Ok(UploadedAttachment::from(stored))
    }

    /// Validates and, when clean, commits the PENDING -> COMPLETED transition.
    /// A rejected submission leaves every record untouched.
    pub fn submit(
        &self,
        token: &str,
        request: SubmissionRequest,
    ) -> Result<ScoreReport, AssessmentError> {
        let record = self.resolve_open(token)?;
        let uploads: HashMap<AttachmentId, Attachment> = self
            .store
            .attachments_for_assessment(&record.id)?
            .into_iter()
            .map(|attachment| (attachment.id, attachment))
            .collect();

        let issues = validate_submission(&record.snapshot, &request, &uploads);
        if !issues.is_empty() {
            warn!(
                assessment_id = %record.id,
                issues = issues.len(),
                "submission rejected"
            );
            return Err(AssessmentError::Validation(issues));
        }

        let mut awarded = HashMap::with_capacity(request.answers.len());
        let mut answers = Vec::with_capacity(request.answers.len());
        for input in request.answers {
            let (Some(question), Some(selected)) =
                (record.snapshot.question(&input.question_id), input.selected_option)
            else {
                continue;
            };
            let score_awarded = question.options.rule(selected).score;
            awarded.insert(input.question_id, score_awarded);
            answers.push(Answer {
                id: AnswerId::new(),
                assessment_id: record.id,
                question_id: input.question_id,
                selected_option: selected,
                comment: input
                    .comment
                    .map(|comment| comment.trim().to_string())
                    .filter(|comment| !comment.is_empty()),
                attachment_ids: input.attachment_ids,
                score_awarded,
            });
        }

        let scores = self.engine.score(&record.snapshot, &awarded);
        let completed_at = self.clock.now();
        let contact = request.contact;
        let submission = CompletedSubmission {
            assessment_id: record.id,
            answers,
            contact: SubmissionContact {
                assessment_id: record.id,
                last_name: contact.last_name.trim().to_string(),
                first_name: contact.first_name.trim().to_string(),
                email: contact.email.trim().to_string(),
                phone: contact.phone.trim().to_string(),
                position: contact.position.trim().to_string(),
                created_at: completed_at,
            },
            scores: scores.clone(),
            completed_at,
        };
        self.store.complete(submission)?;

        info!(
            assessment_id = %record.id,
            percentage = scores.overall_result.percentage,
            rating = ?scores.overall_result.risk_rating,
            "assessment completed"
        );
        Ok(ScoreReport::new(record.id, scores))
    }

    pub fn results_for_token(
        &self,
        token: &str,
        breakdown: bool,
    ) -> Result<AssessmentResults, AssessmentError> {
        let record = self.resolve(token)?;
        match record.effective_status(self.clock.now()) {
            AssessmentStatus::Completed => self.build_results(record, breakdown),
            AssessmentStatus::Expired => Err(AssessmentError::Expired),
            AssessmentStatus::Pending => Err(AssessmentError::NotCompleted),
        }
    }

    pub fn results_for_assessment(
        &self,
        id: &AssessmentId,
        breakdown: bool,
    ) -> Result<AssessmentResults, AssessmentError> {
        let record = self
            .store
            .fetch_assessment(id)?
            .ok_or(AssessmentError::NotFound)?;
        if record.status != AssessmentStatus::Completed {
            return Err(AssessmentError::NotCompleted);
        }
        self.build_results(record, breakdown)
    }

    fn build_results(
        &self,
        record: AssessmentRecord,
        breakdown: bool,
    ) -> Result<AssessmentResults, AssessmentError> {
        let submission = self
            .store
            .fetch_submission(&record.id)?
            .ok_or(AssessmentError::NotCompleted)?;
        let respondent_name = self
            .store
            .fetch_respondent(&record.respondent_id)?
            .map(|respondent| respondent.name)
            .unwrap_or_default();

        let answer_breakdown =
            breakdown.then(|| answer_breakdown(&record.snapshot, &submission.answers));
        let overall_label = submission.scores.overall_result.display_label().to_string();

        Ok(AssessmentResults {
            assessment_id: record.id,
            respondent_id: record.respondent_id,
            respondent_name,
            status: AssessmentStatus::Completed,
            completed_at: record.completed_at,
            contact: Some(submission.contact.into()),
            type_results: submission.scores.type_results,
            overall_result: submission.scores.overall_result,
            overall_label,
            answer_breakdown,
        })
    }

    pub fn get_assessment(&self, id: &AssessmentId) -> Result<AssessmentView, AssessmentError> {
        let record = self
            .store
            .fetch_assessment(id)?
            .ok_or(AssessmentError::NotFound)?;
        let respondent = self.store.fetch_respondent(&record.respondent_id)?;
        Ok(AssessmentView::new(
            record,
            respondent.as_ref(),
            self.clock.now(),
        ))
    }

    pub fn list_assessments(
        &self,
        query: AssessmentQuery,
        page: PageRequest,
    ) -> Result<Page<AssessmentView>, AssessmentError> {
        let mut respondent_id = query.respondent_id;
        if let Some(odoo_id) = query.odoo_id.as_deref() {
            match self.store.find_by_external_id(odoo_id)? {
                Some(respondent) => respondent_id = Some(respondent.id),
                None => return Ok(Page::empty(page)),
            }
        }

        let now = self.clock.now();
        let filter = AssessmentFilter {
            respondent_id,
            employee_id: query.employee_id,
        };
        let records: Vec<AssessmentRecord> = self
            .store
            .list_assessments(&filter)?
            .into_iter()
            .filter(|record| {
                query
                    .status
                    .map_or(true, |status| record.effective_status(now) == status)
            })
            .collect();

        let page = Page::from_items(records, page);
        let mut respondents: HashMap<RespondentId, Option<Respondent>> = HashMap::new();
        for record in &page.items {
            if !respondents.contains_key(&record.respondent_id) {
                let respondent = self.store.fetch_respondent(&record.respondent_id)?;
                respondents.insert(record.respondent_id, respondent);
            }
        }

        Ok(page.map(|record| {
            let respondent = respondents.get(&record.respondent_id).and_then(Option::as_ref);
            AssessmentView::new(record, respondent, now)
        }))
    }

    pub fn list_respondents(
        &self,
        filter: RespondentFilter,
        page: PageRequest,
    ) -> Result<Page<Respondent>, AssessmentError> {
        let respondents = self.store.list_respondents(&filter)?;
        Ok(Page::from_items(respondents, page))
    }

    pub fn get_respondent(&self, id: &RespondentId) -> Result<Respondent, AssessmentError> {
        self.store
            .fetch_respondent(id)?
            .ok_or(AssessmentError::MissingRecord("respondent"))
    }
}

fn resolve_mime_type(content_type: Option<&str>, file_name: &str) -> String {
    let declared = content_type
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .filter(|parsed| *parsed != mime::APPLICATION_OCTET_STREAM);
    match declared {
        Some(parsed) => parsed.essence_str().to_ascii_lowercase(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_ascii_lowercase(),
    }
}

fn answer_breakdown(snapshot: &Snapshot, answers: &[Answer]) -> Vec<AnswerBreakdown> {
    let by_question: HashMap<QuestionId, &Answer> = answers
        .iter()
        .map(|answer| (answer.question_id, answer))
        .collect();

    snapshot
        .questions()
        .filter_map(|(qtype, group, question)| {
            let answer = by_question.get(&question.id)?;
            Some(AnswerBreakdown {
                question_id: question.id,
                question_text: question.text.clone(),
                type_id: qtype.id,
                type_name: qtype.name.clone(),
                group_id: group.id,
                group_name: group.name.clone(),
                selected_option: answer.selected_option,
                comment: answer.comment.clone(),
                score_awarded: answer.score_awarded,
                max_score: question.options.max_score(),
                attachment_count: answer.attachment_ids.len(),
            })
        })
        .collect()
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("assessment not found")]
    NotFound,
    #[error("assessment link has expired")]
    Expired,
    #[error("assessment has already been completed")]
    AlreadyCompleted,
    #[error("assessment is not completed")]
    NotCompleted,
    #[error("submission failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0} not found")]
    MissingRecord(&'static str),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl AssessmentError {
    pub fn code(&self) -> &'static str {
        match self {
            AssessmentError::NotFound | AssessmentError::MissingRecord(_) => "not_found",
            AssessmentError::Expired => "expired",
            AssessmentError::AlreadyCompleted => "already_completed",
            AssessmentError::NotCompleted => "not_completed",
            AssessmentError::Validation(_) => "validation_error",
            AssessmentError::InvalidRequest(_) => "invalid_request",
            AssessmentError::Repository(RepositoryError::Conflict) => "conflict",
            AssessmentError::Repository(_) => "internal",
        }
    }

    /// Respondent-facing message; lifecycle errors are localized.
    pub fn message(&self) -> String {
        match self {
            AssessmentError::NotFound => "Үнэлгээ олдсонгүй.".to_string(),
            AssessmentError::Expired => "Линкний хугацаа дууссан байна.".to_string(),
            AssessmentError::AlreadyCompleted => {
                "Энэ линк аль хэдийн ашиглагдсан байна.".to_string()
            }
            AssessmentError::NotCompleted => "Үнэлгээ дуусаагүй байна.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ClosedReason> for AssessmentError {
    fn from(reason: ClosedReason) -> Self {
        match reason {
            ClosedReason::Expired => Self::Expired,
            ClosedReason::AlreadyCompleted => Self::AlreadyCompleted,
        }
    }
}

impl From<RepositoryError> for AssessmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Closed(reason) => reason.into(),
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::AttachmentMissing {
                question_id,
                attachment_id,
            } => Self::Validation(vec![ValidationIssue::unknown_attachment(
                question_id,
                attachment_id,
            )]),
            other => Self::Repository(other),
        }
    }
}
