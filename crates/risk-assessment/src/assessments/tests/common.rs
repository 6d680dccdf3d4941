use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::assessments::catalog::{
    NewQuestion, NewQuestionGroup, NewQuestionnaireType, OptionRule, QuestionOptions,
};
use crate::assessments::clock::{Clock, ManualClock};
use crate::assessments::domain::{
    AnswerInput, ContactInput, GroupId, OptionKind, QuestionId, RespondentInput, RespondentKind,
    SubmissionRequest, TypeId,
};
use crate::assessments::memory::InMemorySurveyStore;
use crate::assessments::router::{survey_router, SurveyState};
use crate::assessments::service::{AssessmentSettings, CreateAssessmentRequest};
use crate::assessments::views::CreatedAssessment;
use crate::http::{AdminKeys, RateLimitConfig, RateLimiter};

pub(super) const ADMIN_KEY: &str = "test-admin-key";

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct Harness {
    pub store: Arc<InMemorySurveyStore>,
    pub clock: Arc<ManualClock>,
    pub state: SurveyState<InMemorySurveyStore>,
}

pub(super) fn harness() -> Harness {
    harness_with(AssessmentSettings::default())
}

pub(super) fn harness_with(settings: AssessmentSettings) -> Harness {
    let store = Arc::new(InMemorySurveyStore::new());
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let state = SurveyState::new(store.clone(), shared_clock, settings);
    Harness {
        store,
        clock,
        state,
    }
}

/// Catalog with one type, one group and two questions: YES scores 2 and 1,
/// NO scores 0. The second question's NO option demands a 10 character comment.
pub(super) struct SeededCatalog {
    pub type_id: TypeId,
    pub group_id: GroupId,
    pub first: QuestionId,
    pub second: QuestionId,
}

pub(super) fn seed_catalog(harness: &Harness) -> SeededCatalog {
    let catalog = &harness.state.catalog;
    let qtype = catalog
        .create_type(NewQuestionnaireType::named("Галын аюулгүй байдал"))
        .expect("type created");
    let group = catalog
        .create_group(
            &qtype.id,
            NewQuestionGroup {
                name: "Гал унтраах хэрэгсэл".to_string(),
                display_order: 0,
                weight: 1.0,
            },
        )
        .expect("group created");
    let first = catalog
        .create_question(
            &group.id,
            NewQuestion {
                text: "Гал унтраагуур байгаа юу?".to_string(),
                display_order: 0,
                weight: 1.0,
                is_critical: true,
                options: QuestionOptions::new(OptionRule::scored(2), OptionRule::scored(0)),
            },
        )
        .expect("first question created");
    let second = catalog
        .create_question(
            &group.id,
            NewQuestion {
                text: "Яаралтай гарц тэмдэглэгдсэн үү?".to_string(),
                display_order: 1,
                weight: 1.0,
                is_critical: false,
                options: QuestionOptions::new(
                    OptionRule::scored(1),
                    OptionRule {
                        require_comment: true,
                        comment_min_len: 10,
                        ..OptionRule::scored(0)
                    },
                ),
            },
        )
        .expect("second question created");

    SeededCatalog {
        type_id: qtype.id,
        group_id: group.id,
        first: first.id,
        second: second.id,
    }
}

pub(super) fn respondent_input(external_id: Option<&str>) -> RespondentInput {
    RespondentInput {
        external_id: external_id.map(str::to_string),
        name: "Тэнгэр Трейд ХХК".to_string(),
        kind: RespondentKind::Org,
        registration_no: Some("5123456".to_string()),
    }
}

pub(super) fn create_request(seed: &SeededCatalog, external_id: Option<&str>) -> CreateAssessmentRequest {
    CreateAssessmentRequest {
        respondent: respondent_input(external_id),
        selected_type_ids: vec![seed.type_id],
        expires_in_days: None,
        employee_id: Some("emp-7".to_string()),
        employee_name: Some("Бат".to_string()),
    }
}

pub(super) fn create_assessment(harness: &Harness, seed: &SeededCatalog) -> (CreatedAssessment, String) {
    let created = harness
        .state
        .assessments
        .create_assessment(create_request(seed, Some("odoo-42")))
        .expect("assessment created");
    let token = token_from_url(&created.url);
    (created, token)
}

pub(super) fn token_from_url(url: &str) -> String {
    url.rsplit('/').next().expect("url has a token").to_string()
}

pub(super) fn contact() -> ContactInput {
    ContactInput {
        last_name: "Дорж".to_string(),
        first_name: "Сараа".to_string(),
        email: "saraa@example.mn".to_string(),
        phone: "99112233".to_string(),
        position: "Аюулгүй ажиллагааны ажилтан".to_string(),
    }
}

pub(super) fn answer(question_id: QuestionId, option: OptionKind) -> AnswerInput {
    AnswerInput {
        question_id,
        selected_option: Some(option),
        comment: None,
        attachment_ids: Vec::new(),
    }
}

pub(super) fn all_yes(seed: &SeededCatalog) -> SubmissionRequest {
    SubmissionRequest {
        contact: contact(),
        answers: vec![
            answer(seed.first, OptionKind::Yes),
            answer(seed.second, OptionKind::Yes),
        ],
    }
}

pub(super) fn limiter(max_requests: u32) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig {
        max_requests,
        ..RateLimitConfig::default()
    }))
}

pub(super) fn router(harness: &Harness) -> axum::Router {
    router_with_limit(harness, 1_000)
}

pub(super) fn router_with_limit(harness: &Harness, max_requests: u32) -> axum::Router {
    survey_router(
        harness.state.clone(),
        AdminKeys::new([ADMIN_KEY]),
        limiter(max_requests),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
