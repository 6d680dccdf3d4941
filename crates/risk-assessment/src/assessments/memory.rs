use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::catalog::{Question, QuestionGroup, QuestionnaireType};
use super::domain::{
    AssessmentDraft, AssessmentId, AssessmentRecord, AssessmentStatus, Attachment, AttachmentId,
    CompletedSubmission, DraftData, DraftId, GroupId, QuestionId, Respondent, RespondentId,
    RespondentInput, TypeId,
};
use super::repository::{
    AssessmentFilter, AssessmentRepository, AttachmentStore, CatalogRepository, RepositoryError,
    RespondentFilter, RespondentRepository,
};

#[derive(Debug, Default)]
struct StoreState {
    types: HashMap<TypeId, QuestionnaireType>,
    groups: HashMap<GroupId, QuestionGroup>,
    questions: HashMap<QuestionId, Question>,
    respondents: HashMap<RespondentId, Respondent>,
    assessments: HashMap<AssessmentId, AssessmentRecord>,
    drafts: HashMap<AssessmentId, AssessmentDraft>,
    submissions: HashMap<AssessmentId, CompletedSubmission>,
    attachments: HashMap<AttachmentId, Attachment>,
    blobs: HashMap<String, Vec<u8>>,
}

/// In-process store. Every table sits behind one mutex so multi-table
/// transitions are applied as a unit.
#[derive(Debug, Default, Clone)]
pub struct InMemorySurveyStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemorySurveyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("survey store mutex poisoned".to_string()))
    }

    pub fn respondent_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.respondents.len())
    }

    pub fn attachment_bytes(&self, storage_key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        Ok(self.lock()?.blobs.get(storage_key).cloned())
    }
}

impl CatalogRepository for InMemorySurveyStore {
    fn insert_type(
        &self,
        record: QuestionnaireType,
    ) -> Result<QuestionnaireType, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.types.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.types.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_type(&self, record: QuestionnaireType) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.types.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_type(&self, id: &TypeId) -> Result<Option<QuestionnaireType>, RepositoryError> {
        Ok(self.lock()?.types.get(id).cloned())
    }

    fn list_types(&self, active_only: bool) -> Result<Vec<QuestionnaireType>, RepositoryError> {
        let guard = self.lock()?;
        let mut types: Vec<QuestionnaireType> = guard
            .types
            .values()
            .filter(|record| !active_only || record.is_active)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(types)
    }

    fn insert_group(&self, group: QuestionGroup) -> Result<QuestionGroup, RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.types.contains_key(&group.type_id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.groups.contains_key(&group.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn update_group(&self, group: QuestionGroup) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.groups.get_mut(&group.id) {
            Some(existing) => {
                *existing = group;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_group(&self, id: &GroupId) -> Result<Option<QuestionGroup>, RepositoryError> {
        Ok(self.lock()?.groups.get(id).cloned())
    }

    fn groups_for_type(&self, type_id: &TypeId) -> Result<Vec<QuestionGroup>, RepositoryError> {
        let guard = self.lock()?;
        let mut groups: Vec<QuestionGroup> = guard
            .groups
            .values()
            .filter(|group| &group.type_id == type_id)
            .cloned()
            .collect();
        groups.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(groups)
    }

    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.groups.contains_key(&question.group_id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.questions.contains_key(&question.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.questions.insert(question.id, question.clone());
        Ok(question)
    }

    fn update_question(&self, question: Question) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.questions.get_mut(&question.id) {
            Some(existing) => {
                *existing = question;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError> {
        Ok(self.lock()?.questions.get(id).cloned())
    }

    fn questions_for_group(&self, group_id: &GroupId) -> Result<Vec<Question>, RepositoryError> {
        let guard = self.lock()?;
        let mut questions: Vec<Question> = guard
            .questions
            .values()
            .filter(|question| &question.group_id == group_id)
            .cloned()
            .collect();
        questions.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.id.cmp(&b.id)));
        Ok(questions)
    }
}

impl RespondentRepository for InMemorySurveyStore {
    fn upsert_respondent(
        &self,
        input: RespondentInput,
        now: DateTime<Utc>,
    ) -> Result<Respondent, RepositoryError> {
        let mut guard = self.lock()?;
        let external_id = input
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let registration_no = input
            .registration_no
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let by_external = external_id.and_then(|external| {
            guard
                .respondents
                .values()
                .find(|respondent| respondent.external_id.as_deref() == Some(external))
                .map(|respondent| respondent.id)
        });
        let by_registration = || {
            registration_no.and_then(|registration| {
                guard
                    .respondents
                    .values()
                    .find(|respondent| {
                        respondent.external_id.is_none()
                            && respondent.kind == input.kind
                            && respondent.registration_no.as_deref() == Some(registration)
                    })
                    .map(|respondent| respondent.id)
            })
        };
        let matched = by_external.or_else(by_registration);

        if let Some(id) = matched {
            if let Some(existing) = guard.respondents.get_mut(&id) {
                existing.name = input.name.trim().to_string();
                if let Some(external) = external_id {
                    existing.external_id = Some(external.to_string());
                }
                if let Some(registration) = registration_no {
                    existing.registration_no = Some(registration.to_string());
                }
                existing.updated_at = now;
                return Ok(existing.clone());
            }
        }

        let respondent = Respondent {
            id: RespondentId::new(),
            external_id: external_id.map(str::to_string),
            kind: input.kind,
            name: input.name.trim().to_string(),
            registration_no: registration_no.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        guard.respondents.insert(respondent.id, respondent.clone());
        Ok(respondent)
    }

    fn fetch_respondent(&self, id: &RespondentId) -> Result<Option<Respondent>, RepositoryError> {
        Ok(self.lock()?.respondents.get(id).cloned())
    }

    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Respondent>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .respondents
            .values()
            .find(|respondent| respondent.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    fn list_respondents(
        &self,
        filter: &RespondentFilter,
    ) -> Result<Vec<Respondent>, RepositoryError> {
        let guard = self.lock()?;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut respondents: Vec<Respondent> = guard
            .respondents
            .values()
            .filter(|respondent| filter.kind.map_or(true, |kind| respondent.kind == kind))
            .filter(|respondent| {
                needle
                    .as_deref()
                    .map_or(true, |needle| respondent.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        respondents.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(respondents)
    }
}

impl AssessmentRepository for InMemorySurveyStore {
    fn insert_assessment(
        &self,
        record: AssessmentRecord,
    ) -> Result<AssessmentRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let duplicate = guard.assessments.contains_key(&record.id)
            || guard
                .assessments
                .values()
                .any(|existing| existing.token_hash == record.token_hash);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        if !guard.respondents.contains_key(&record.respondent_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.assessments.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch_assessment(
        &self,
        id: &AssessmentId,
    ) -> Result<Option<AssessmentRecord>, RepositoryError> {
        Ok(self.lock()?.assessments.get(id).cloned())
    }

    fn fetch_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AssessmentRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .assessments
            .values()
            .find(|record| record.token_hash == token_hash)
            .cloned())
    }

    fn list_assessments(
        &self,
        filter: &AssessmentFilter,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let guard = self.lock()?;
        let mut records: Vec<AssessmentRecord> = guard
            .assessments
            .values()
            .filter(|record| {
                filter
                    .respondent_id
                    .map_or(true, |id| record.respondent_id == id)
            })
            .filter(|record| {
                filter
                    .employee_id
                    .as_deref()
                    .map_or(true, |employee| record.employee_id.as_deref() == Some(employee))
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    fn fetch_draft(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Ok(self.lock()?.drafts.get(assessment_id).cloned())
    }

    fn upsert_draft(
        &self,
        assessment_id: &AssessmentId,
        data: DraftData,
        now: DateTime<Utc>,
    ) -> Result<AssessmentDraft, RepositoryError> {
        let mut guard = self.lock()?;
        let record = guard
            .assessments
            .get(assessment_id)
            .ok_or(RepositoryError::NotFound)?;
        record.ensure_open(now)?;

        let draft = match guard.drafts.get_mut(assessment_id) {
            Some(existing) => {
                existing.data = data;
                existing.last_saved_at = now;
                existing.clone()
            }
            None => {
                let draft = AssessmentDraft {
                    id: DraftId::new(),
                    assessment_id: *assessment_id,
                    data,
                    last_saved_at: now,
                    created_at: now,
                };
                guard.drafts.insert(*assessment_id, draft.clone());
                draft
            }
        };
        Ok(draft)
    }

    fn complete(&self, submission: CompletedSubmission) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let record = state
            .assessments
            .get_mut(&submission.assessment_id)
            .ok_or(RepositoryError::NotFound)?;
        record.ensure_open(submission.completed_at)?;

        // uploads may have been removed since the submission was validated
        for answer in &submission.answers {
            for attachment_id in &answer.attachment_ids {
                let owned = state.attachments.get(attachment_id).is_some_and(|attachment| {
                    attachment.assessment_id == submission.assessment_id
                        && attachment.question_id == answer.question_id
                });
                if !owned {
                    return Err(RepositoryError::AttachmentMissing {
                        question_id: answer.question_id,
                        attachment_id: *attachment_id,
                    });
                }
            }
        }

        record.status = AssessmentStatus::Completed;
        record.completed_at = Some(submission.completed_at);

        for answer in &submission.answers {
            for attachment_id in &answer.attachment_ids {
                if let Some(attachment) = state.attachments.get_mut(attachment_id) {
                    attachment.answer_id = Some(answer.id);
                }
            }
        }
        state.drafts.remove(&submission.assessment_id);
        state
            .submissions
            .insert(submission.assessment_id, submission);
        Ok(())
    }

    fn fetch_submission(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<CompletedSubmission>, RepositoryError> {
        Ok(self.lock()?.submissions.get(assessment_id).cloned())
    }

    fn stale_drafts(
        &self,
        expired_before: DateTime<Utc>,
    ) -> Result<Vec<(AssessmentDraft, AssessmentRecord)>, RepositoryError> {
        let guard = self.lock()?;
        let mut stale: Vec<(AssessmentDraft, AssessmentRecord)> = guard
            .drafts
            .values()
            .filter_map(|draft| {
                let record = guard.assessments.get(&draft.assessment_id)?;
                let eligible = record.status != AssessmentStatus::Completed
                    && record.expires_at < expired_before;
                eligible.then(|| (draft.clone(), record.clone()))
            })
            .collect();
        stale.sort_by(|a, b| a.1.expires_at.cmp(&b.1.expires_at));
        Ok(stale)
    }

    fn delete_drafts(&self, assessment_ids: &[AssessmentId]) -> Result<usize, RepositoryError> {
        let mut guard = self.lock()?;
        let mut deleted = 0;
        for id in assessment_ids {
            if guard.drafts.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl AttachmentStore for InMemorySurveyStore {
    fn save_attachment(
        &self,
        attachment: Attachment,
        bytes: Vec<u8>,
    ) -> Result<Attachment, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.attachments.contains_key(&attachment.id)
            || guard.blobs.contains_key(&attachment.storage_key)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.blobs.insert(attachment.storage_key.clone(), bytes);
        guard.attachments.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    fn fetch_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>, RepositoryError> {
        Ok(self.lock()?.attachments.get(id).cloned())
    }

    fn attachments_for_assessment(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let guard = self.lock()?;
        let mut attachments: Vec<Attachment> = guard
            .attachments
            .values()
            .filter(|attachment| &attachment.assessment_id == assessment_id)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(attachments)
    }

    fn unlinked_attachments(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let guard = self.lock()?;
        let mut attachments: Vec<Attachment> = guard
            .attachments
            .values()
            .filter(|attachment| {
                attachment.answer_id.is_none() && attachment.created_at < created_before
            })
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(attachments)
    }

    fn delete_attachments(
        &self,
        ids: &[AttachmentId],
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let mut guard = self.lock()?;
        let mut removed = Vec::new();
        for id in ids {
            if let Some(attachment) = guard.attachments.remove(id) {
                guard.blobs.remove(&attachment.storage_key);
                removed.push(attachment);
            }
        }
        Ok(removed)
    }
}
