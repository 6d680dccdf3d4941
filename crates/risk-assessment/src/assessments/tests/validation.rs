use std::collections::HashMap;

use super::common::*;
use crate::assessments::catalog::{OptionRule, QuestionOptions};
use crate::assessments::domain::{
    Answer, AnswerId, AssessmentStatus, AttachmentId, CompletedSubmission, OptionKind, QuestionId,
    SubmissionContact,
};
use crate::assessments::repository::{AssessmentRepository, AttachmentStore, RepositoryError};
use crate::assessments::scoring::{ScoringEngine, ScoringPolicy};
use crate::assessments::service::{AssessmentError, UploadRequest};
use crate::assessments::validation::{IssueCode, ValidationIssue};

fn png(question_id: QuestionId) -> UploadRequest {
    UploadRequest {
        question_id,
        file_name: "C:\\photos\\exit.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

fn rejected(result: Result<impl std::fmt::Debug, AssessmentError>) -> Vec<ValidationIssue> {
    match result {
        Err(AssessmentError::Validation(issues)) => issues,
        other => panic!("expected validation error, got {other:?}"),
    }
}

fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
    issues.iter().map(|issue| issue.code).collect()
}

#[test]
fn missing_answers_are_itemized_and_nothing_is_written() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (created, token) = create_assessment(&harness, &seed);

    let mut request = all_yes(&seed);
    request.answers.truncate(1);
    let issues = rejected(harness.state.assessments.submit(&token, request));

    assert_eq!(codes(&issues), vec![IssueCode::Unanswered]);
    assert_eq!(issues[0].question_id, Some(seed.second));
    let record = harness
        .store
        .fetch_assessment(&created.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(record.status, AssessmentStatus::Pending);
    assert!(harness
        .store
        .fetch_submission(&created.id)
        .expect("fetch")
        .is_none());
}

#[test]
fn comment_rules_follow_the_selected_option() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    let mut request = all_yes(&seed);
    request.answers[1].selected_option = Some(OptionKind::No);
    request.answers[1].comment = Some("богино".to_string());
    let issues = rejected(service.submit(&token, request.clone()));
    assert_eq!(codes(&issues), vec![IssueCode::CommentRequired]);
    assert_eq!(
        issues[0].message,
        format!(
            "Question {}: Comment required with minimum 10 characters",
            seed.second
        )
    );

    request.answers[1].comment = Some("Гарц хаалттай байсан".to_string());
    assert!(service.submit(&token, request).is_ok());
}

#[test]
fn free_text_comments_with_colons_and_brackets_are_accepted() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);

    let mut request = all_yes(&seed);
    request.answers[1].selected_option = Some(OptionKind::No);
    request.answers[1].comment = Some(
        "Checked the profile: exits are blocked; metadata: a<b on floor plan".to_string(),
    );

    let report = harness
        .state
        .assessments
        .submit(&token, request)
        .expect("plain comment accepted");
    assert_eq!(report.overall_result.raw_score, 2);
}

#[test]
fn unknown_duplicate_and_empty_answers_are_reported() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);

    let mut request = all_yes(&seed);
    request.answers.push(answer(seed.first, OptionKind::No));
    request.answers.push(answer(QuestionId::new(), OptionKind::Yes));
    request.answers[1].selected_option = None;
    let issues = rejected(harness.state.assessments.submit(&token, request));

    let found = codes(&issues);
    assert!(found.contains(&IssueCode::DuplicateAnswer));
    assert!(found.contains(&IssueCode::UnknownQuestion));
    assert!(found.contains(&IssueCode::MissingOption));
}

#[test]
fn contact_fields_are_checked() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);

    let mut request = all_yes(&seed);
    request.contact.email = "not-an-email".to_string();
    request.contact.first_name = "   ".to_string();
    let issues = rejected(harness.state.assessments.submit(&token, request));

    let fields: Vec<Option<&str>> = issues.iter().map(|issue| issue.field.as_deref()).collect();
    assert!(fields.contains(&Some("email")));
    assert!(fields.contains(&Some("first_name")));
    assert!(issues
        .iter()
        .all(|issue| issue.code == IssueCode::InvalidContact));
}

#[test]
fn image_rules_and_attachment_ownership() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    harness
        .state
        .catalog
        .set_options(
            &seed.first,
            QuestionOptions::new(
                OptionRule {
                    require_image: true,
                    max_images: 1,
                    ..OptionRule::scored(2)
                },
                OptionRule::scored(0),
            ),
        )
        .expect("options replaced");
    let (_, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    let issues = rejected(service.submit(&token, all_yes(&seed)));
    assert_eq!(codes(&issues), vec![IssueCode::ImageRequired]);

    let wrong_question = service
        .upload_attachment(&token, png(seed.second))
        .expect("upload for another question");
    let first_photo = service
        .upload_attachment(&token, png(seed.first))
        .expect("upload");
    let second_photo = service
        .upload_attachment(&token, png(seed.first))
        .expect("upload");

    let mut request = all_yes(&seed);
    request.answers[0].attachment_ids =
        vec![first_photo.id, wrong_question.id, AttachmentId::new()];
    let issues = rejected(service.submit(&token, request));
    let found = codes(&issues);
    assert!(found.contains(&IssueCode::TooManyImages));
    assert_eq!(
        found
            .iter()
            .filter(|code| **code == IssueCode::UnknownAttachment)
            .count(),
        2
    );

    let mut request = all_yes(&seed);
    request.answers[0].attachment_ids = vec![second_photo.id];
    service.submit(&token, request).expect("submit with photo");

    let linked = harness
        .store
        .fetch_attachment(&second_photo.id)
        .expect("fetch")
        .expect("present");
    assert!(linked.answer_id.is_some());
    let orphan = harness
        .store
        .fetch_attachment(&first_photo.id)
        .expect("fetch")
        .expect("present");
    assert!(orphan.answer_id.is_none());
}

#[test]
fn completion_fails_when_an_upload_vanished_after_validation() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (created, token) = create_assessment(&harness, &seed);
    let photo = harness
        .state
        .assessments
        .upload_attachment(&token, png(seed.first))
        .expect("upload");
    let record = harness
        .store
        .fetch_assessment(&created.id)
        .expect("fetch")
        .expect("present");

    // an image cleanup run lands between validation and the commit
    harness
        .store
        .delete_attachments(&[photo.id])
        .expect("attachment removed");

    let answer = |question_id, attachment_ids| Answer {
        id: AnswerId::new(),
        assessment_id: created.id,
        question_id,
        selected_option: OptionKind::Yes,
        comment: None,
        attachment_ids,
        score_awarded: 0,
    };
    let submission = CompletedSubmission {
        assessment_id: created.id,
        answers: vec![answer(seed.first, vec![photo.id]), answer(seed.second, Vec::new())],
        contact: SubmissionContact {
            assessment_id: created.id,
            last_name: "Дорж".to_string(),
            first_name: "Сараа".to_string(),
            email: "saraa@example.mn".to_string(),
            phone: "99112233".to_string(),
            position: "Инженер".to_string(),
            created_at: fixed_now(),
        },
        scores: ScoringEngine::new(ScoringPolicy::default())
            .score(&record.snapshot, &HashMap::new()),
        completed_at: fixed_now(),
    };

    let err = harness
        .store
        .complete(submission)
        .expect_err("missing attachment blocks completion");
    match &err {
        RepositoryError::AttachmentMissing {
            question_id,
            attachment_id,
        } => {
            assert_eq!(*question_id, seed.first);
            assert_eq!(*attachment_id, photo.id);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let issues = rejected(Err::<(), _>(AssessmentError::from(err)));
    assert_eq!(codes(&issues), vec![IssueCode::UnknownAttachment]);

    let record = harness
        .store
        .fetch_assessment(&created.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(record.status, AssessmentStatus::Pending);
    assert!(harness
        .store
        .fetch_submission(&created.id)
        .expect("fetch")
        .is_none());
}

#[test]
fn uploads_are_checked_before_storing() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (created, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    let stored = service
        .upload_attachment(&token, png(seed.first))
        .expect("png accepted");
    assert_eq!(stored.original_name, "exit.png");
    assert_eq!(stored.mime_type, "image/png");
    assert_eq!(stored.size_bytes, 4);

    let mut pdf = png(seed.first);
    pdf.file_name = "report.pdf".to_string();
    pdf.content_type = None;
    assert!(matches!(
        service.upload_attachment(&token, pdf),
        Err(AssessmentError::InvalidRequest(_))
    ));

    let mut empty = png(seed.first);
    empty.bytes.clear();
    assert!(matches!(
        service.upload_attachment(&token, empty),
        Err(AssessmentError::InvalidRequest(_))
    ));

    let mut oversized = png(seed.first);
    oversized.bytes = vec![0; 5 * 1024 * 1024 + 1];
    assert!(matches!(
        service.upload_attachment(&token, oversized),
        Err(AssessmentError::InvalidRequest(_))
    ));

    assert!(matches!(
        service.upload_attachment(&token, png(QuestionId::new())),
        Err(AssessmentError::InvalidRequest(_))
    ));

    let attachments = harness
        .store
        .attachments_for_assessment(&created.id)
        .expect("list");
    assert_eq!(attachments.len(), 1);
    let attachment = &attachments[0];
    assert!(attachment.storage_key.starts_with(&format!(
        "assessments/{}/{}/",
        created.id, seed.first
    )));
    assert_eq!(
        harness
            .store
            .attachment_bytes(&attachment.storage_key)
            .expect("read"),
        Some(vec![0x89, 0x50, 0x4e, 0x47])
    );
}
