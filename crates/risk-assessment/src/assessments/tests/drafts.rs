use std::thread;

use chrono::Duration;

use super::common::*;
use crate::assessments::domain::{DraftAnswer, DraftData, OptionKind, QuestionId};
use crate::assessments::repository::AssessmentRepository;
use crate::assessments::service::{AssessmentError, DRAFT_SAVED_MESSAGE};

fn draft_with(question_id: QuestionId, option: OptionKind, type_index: u32) -> DraftData {
    DraftData {
        answers: vec![DraftAnswer {
            question_id,
            selected_option: Some(option),
            comment: None,
            attachment_ids: Vec::new(),
        }],
        current_type_index: Some(type_index),
        current_group_index: Some(0),
    }
}

#[test]
fn load_returns_nothing_before_first_save() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);

    let draft = harness
        .state
        .assessments
        .load_draft(&token)
        .expect("draft lookup");

    assert!(draft.is_none());
}

#[test]
fn last_write_wins() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    let saved = service
        .save_draft(&token, draft_with(seed.first, OptionKind::Yes, 0))
        .expect("first save");
    assert_eq!(saved.message, DRAFT_SAVED_MESSAGE);

    harness.clock.advance(Duration::minutes(5));
    let second = service
        .save_draft(&token, draft_with(seed.second, OptionKind::No, 1))
        .expect("second save");
    assert_eq!(second.last_saved_at, fixed_now() + Duration::minutes(5));

    let draft = service
        .load_draft(&token)
        .expect("draft lookup")
        .expect("draft present");
    assert_eq!(draft.answers.len(), 1);
    assert_eq!(draft.answers[0].question_id, seed.second);
    assert_eq!(draft.current_type_index, Some(1));
    assert_eq!(draft.last_saved_at, fixed_now() + Duration::minutes(5));

    let form = service.fetch_form(&token).expect("form loads");
    assert_eq!(form.draft, Some(draft));
}

#[test]
fn drafts_are_not_validated() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (_, token) = create_assessment(&harness, &seed);

    let stray = DraftData {
        answers: vec![DraftAnswer {
            question_id: QuestionId::new(),
            selected_option: None,
            comment: Some("<b>not checked yet</b>".to_string()),
            attachment_ids: Vec::new(),
        }],
        ..DraftData::default()
    };

    assert!(harness.state.assessments.save_draft(&token, stray).is_ok());
}

#[test]
fn draft_saves_after_completion_are_refused() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (created, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    service
        .save_draft(&token, draft_with(seed.first, OptionKind::Yes, 0))
        .expect("save while pending");
    service.submit(&token, all_yes(&seed)).expect("submit");

    let result = service.save_draft(&token, draft_with(seed.first, OptionKind::No, 0));
    assert!(matches!(result, Err(AssessmentError::AlreadyCompleted)));
    assert!(harness
        .store
        .fetch_draft(&created.id)
        .expect("lookup")
        .is_none());
}

#[test]
fn concurrent_saves_leave_exactly_one_complete_draft() {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let (created, token) = create_assessment(&harness, &seed);
    let service = &harness.state.assessments;

    let writes: Vec<DraftData> = (0..8)
        .map(|index| draft_with(seed.first, OptionKind::Yes, index))
        .collect();
    thread::scope(|scope| {
        for data in &writes {
            let token = token.as_str();
            scope.spawn(move || {
                service
                    .save_draft(token, data.clone())
                    .expect("concurrent save succeeds");
            });
        }
    });

    let stored = harness
        .store
        .fetch_draft(&created.id)
        .expect("lookup")
        .expect("draft present");
    assert!(writes.contains(&stored.data));
}
