use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::domain::{Attachment, AttachmentId, ContactInput, QuestionId, SubmissionRequest};
use super::snapshot::Snapshot;

pub const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidContact,
    UnknownQuestion,
    DuplicateAnswer,
    MissingOption,
    CommentRequired,
    CommentTooLong,
    ImageRequired,
    TooManyImages,
    UnknownAttachment,
    Unanswered,
}

/// One itemized reason a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    fn question(question_id: QuestionId, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(question_id),
            field: None,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_attachment(
        question_id: QuestionId,
        attachment_id: AttachmentId,
    ) -> Self {
        Self::question(
            question_id,
            IssueCode::UnknownAttachment,
            format!(
                "Question {question_id}: attachment {attachment_id} was not uploaded for this question"
            ),
        )
    }

    fn contact(field: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            field: Some(field.to_string()),
            code: IssueCode::InvalidContact,
            message: message.into(),
        }
    }
}

/// Checks a final submission against the assessment's own snapshot.
///
/// `uploads` holds the attachments stored for this assessment. An empty result
/// means the submission may be committed.
pub fn validate_submission(
    snapshot: &Snapshot,
    request: &SubmissionRequest,
    uploads: &HashMap<AttachmentId, Attachment>,
) -> Vec<ValidationIssue> {
    let mut issues = validate_contact(&request.contact);
    let mut answered: HashSet<QuestionId> = HashSet::new();

    for answer in &request.answers {
        let question_id = answer.question_id;
        let Some(question) = snapshot.question(&question_id) else {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::UnknownQuestion,
                format!("Question {question_id} not found in assessment"),
            ));
            continue;
        };
        if !answered.insert(question_id) {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::DuplicateAnswer,
                format!("Question {question_id} answered more than once"),
            ));
            continue;
        }
        let Some(selected) = answer.selected_option else {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::MissingOption,
                format!("Question {question_id}: an option must be selected"),
            ));
            continue;
        };
        let rule = question.options.rule(selected);
        let comment = answer.comment.as_deref().map(str::trim).unwrap_or_default();
        let comment_len = comment.chars().count();

        if comment_len > MAX_COMMENT_LEN {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::CommentTooLong,
                format!("Question {question_id}: Comment must be at most {MAX_COMMENT_LEN} characters"),
            ));
        }
        if rule.require_comment {
            let min_len = (rule.comment_min_len as usize).max(1);
            if comment_len < min_len {
                issues.push(ValidationIssue::question(
                    question_id,
                    IssueCode::CommentRequired,
                    format!(
                        "Question {question_id}: Comment required with minimum {} characters",
                        rule.comment_min_len
                    ),
                ));
            }
        }
        if rule.require_image && answer.attachment_ids.is_empty() {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::ImageRequired,
                format!("Question {question_id}: At least one image required"),
            ));
        }
        if answer.attachment_ids.len() > rule.max_images as usize {
            issues.push(ValidationIssue::question(
                question_id,
                IssueCode::TooManyImages,
                format!(
                    "Question {question_id}: Maximum {} images allowed",
                    rule.max_images
                ),
            ));
        }
        for attachment_id in &answer.attachment_ids {
            let belongs = uploads
                .get(attachment_id)
                .is_some_and(|attachment| attachment.question_id == question_id);
            if !belongs {
                issues.push(ValidationIssue::unknown_attachment(
                    question_id,
                    *attachment_id,
                ));
            }
        }
    }

    for (_, _, question) in snapshot.questions() {
        if !answered.contains(&question.id) {
            issues.push(ValidationIssue::question(
                question.id,
                IssueCode::Unanswered,
                format!("Question {} not answered", question.id),
            ));
        }
    }

    issues
}

fn validate_contact(contact: &ContactInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (field, value, max) in [
        ("last_name", &contact.last_name, 100),
        ("first_name", &contact.first_name, 100),
        ("phone", &contact.phone, 50),
        ("position", &contact.position, 200),
    ] {
        let len = value.trim().chars().count();
        if len == 0 || len > max {
            issues.push(ValidationIssue::contact(
                field,
                format!("{field} must be between 1 and {max} characters"),
            ));
        }
    }

    if !is_valid_email(contact.email.trim()) {
        issues.push(ValidationIssue::contact(
            "email",
            "email must be a valid address",
        ));
    }

    issues
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && value.len() <= 254
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_check_accepts_plain_addresses() {
        assert!(is_valid_email("bold@example.mn"));
        assert!(!is_valid_email("bold@example"));
        assert!(!is_valid_email("bold example@mail.mn"));
        assert!(!is_valid_email("@example.mn"));
        assert!(!is_valid_email("a@b@c.mn"));
    }
}
