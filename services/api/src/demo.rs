use crate::infra::{in_memory_survey_state, seed_catalog_from_path, seed_catalog_from_str};
use chrono::{Duration, Utc};
use clap::Args;
use risk_assessment::assessments::service::UploadRequest;
use risk_assessment::assessments::snapshot::SnapshotType;
use risk_assessment::assessments::views::AssessmentResults;
use risk_assessment::assessments::{
    AnswerInput, AssessmentSettings, Clock, ContactInput, CreateAssessmentRequest, DraftAnswer,
    DraftData, GradeScale, InMemorySurveyStore, ManualClock, OptionKind, RespondentInput,
    RespondentKind, ScoringPolicy, SubmissionRequest, SurveyState,
};
use risk_assessment::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_CATALOG: &str = "\
type,group,question,yes_score,no_score,no_require_comment,comment_min_len,yes_require_image,max_images
Галын аюулгүй байдал,Гал унтраах хэрэгсэл,Гал унтраагуур бүх давхарт байгаа юу?,3,0,true,10,,
Галын аюулгүй байдал,Гал унтраах хэрэгсэл,Галын дохиолол сүүлийн 6 сард шалгагдсан уу?,2,0,true,10,,
Галын аюулгүй байдал,Гарц,Яаралтай гарц чөлөөтэй юу?,5,0,true,10,,
Цахилгааны аюул,Утаслага,Цахилгааны утаслага мэргэжлийн байгууллагаар шалгагдсан уу?,4,1,,,true,2
Цахилгааны аюул,Утаслага,Ил гарсан утас байхгүй юу?,2,0,,,,
";

// 1x1 transparent PNG
const SAMPLE_PHOTO: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const NO_COMMENT: &str = "Шалгалт хараахан хийгдээгүй, дараа сард төлөвлөсөн.";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Catalog CSV to use instead of the built-in sample catalog
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
    /// Answer NO to every n-th question (0 answers YES everywhere)
    #[arg(long, default_value_t = 3)]
    pub(crate) no_every: usize,
    /// Attach the AAA..D grade to the overall result
    #[arg(long)]
    pub(crate) graded: bool,
    /// Print the per-question breakdown after the scores
    #[arg(long)]
    pub(crate) breakdown: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let results = run_demo_flow(&args)?;
    print_results(&results, args.breakdown);
    Ok(())
}

/// Seeds a catalog, issues a link, autosaves half the answers, submits and
/// returns the stored results. Everything runs against an in-process store.
pub(crate) fn run_demo_flow(args: &DemoArgs) -> Result<AssessmentResults, AppError> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let shared: Arc<dyn Clock> = clock.clone();
    let mut settings = AssessmentSettings::default();
    if args.graded {
        settings.scoring = ScoringPolicy::default().with_grades(GradeScale::standard());
    }
    let state = in_memory_survey_state(shared, settings);

    let summary = match args.catalog_csv.as_deref() {
        Some(path) => seed_catalog_from_path(&state, path)?,
        None => seed_catalog_from_str(&state, SAMPLE_CATALOG)?,
    };
    println!(
        "Catalog: {} type(s), {} group(s), {} question(s)",
        summary.types, summary.groups, summary.questions
    );

    let token = issue_link(&state)?;
    let form = state.assessments.fetch_form(&token)?;
    let answers = plan_answers(&state, &token, &form.types, args.no_every)?;

    let half = answers.len() / 2;
    let draft = DraftData {
        answers: answers[..half]
            .iter()
            .map(|answer| DraftAnswer {
                question_id: answer.question_id,
                selected_option: answer.selected_option,
                comment: answer.comment.clone(),
                attachment_ids: answer.attachment_ids.clone(),
            })
            .collect(),
        current_type_index: Some(0),
        current_group_index: Some(0),
    };
    let saved = state.assessments.save_draft(&token, draft)?;
    println!("Draft saved at {} ({} answer(s))", saved.last_saved_at, half);

    clock.advance(Duration::minutes(12));
    let report = state.assessments.submit(
        &token,
        SubmissionRequest {
            contact: ContactInput {
                last_name: "Дорж".to_string(),
                first_name: "Сараа".to_string(),
                email: "saraa@example.mn".to_string(),
                phone: "99112233".to_string(),
                position: "Аюулгүй ажиллагааны ажилтан".to_string(),
            },
            answers,
        },
    )?;

    Ok(state
        .assessments
        .results_for_assessment(&report.assessment_id, true)?)
}

fn issue_link(state: &SurveyState<InMemorySurveyStore>) -> Result<String, AppError> {
    let selected_type_ids = state
        .catalog
        .list_types(true)?
        .into_iter()
        .map(|qtype| qtype.id)
        .collect();
    let created = state.assessments.create_assessment(CreateAssessmentRequest {
        respondent: RespondentInput {
            external_id: Some("demo-001".to_string()),
            name: "Тэнгэр Трейд ХХК".to_string(),
            kind: RespondentKind::Org,
            registration_no: Some("5123456".to_string()),
        },
        selected_type_ids,
        expires_in_days: Some(7),
        employee_id: Some("emp-7".to_string()),
        employee_name: Some("Бат".to_string()),
    })?;
    println!("Link issued: {} (expires {})", created.url, created.expires_at);

    Ok(created
        .url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string())
}

/// Picks an answer per question that satisfies its option rule, uploading a
/// photo wherever the chosen option asks for one.
fn plan_answers(
    state: &SurveyState<InMemorySurveyStore>,
    token: &str,
    types: &[SnapshotType],
    no_every: usize,
) -> Result<Vec<AnswerInput>, AppError> {
    let questions = types
        .iter()
        .flat_map(|qtype| qtype.groups.iter())
        .flat_map(|group| group.questions.iter());

    let mut answers = Vec::new();
    for (index, question) in questions.enumerate() {
        let option = if no_every > 0 && (index + 1) % no_every == 0 {
            OptionKind::No
        } else {
            OptionKind::Yes
        };
        let rule = question.options.rule(option);

        let comment = rule.require_comment.then(|| {
            let min_len = rule.comment_min_len as usize;
            let mut text = NO_COMMENT.to_string();
            while text.chars().count() < min_len {
                text.push_str(" .");
            }
            text
        });

        let mut attachment_ids = Vec::new();
        if rule.require_image {
            let uploaded = state.assessments.upload_attachment(
                token,
                UploadRequest {
                    question_id: question.id,
                    file_name: "photo.png".to_string(),
                    content_type: Some("image/png".to_string()),
                    bytes: SAMPLE_PHOTO.to_vec(),
                },
            )?;
            attachment_ids.push(uploaded.id);
        }

        answers.push(AnswerInput {
            question_id: question.id,
            selected_option: Some(option),
            comment,
            attachment_ids,
        });
    }
    Ok(answers)
}

fn print_results(results: &AssessmentResults, breakdown: bool) {
    println!();
    println!(
        "Respondent: {} ({})",
        results.respondent_name,
        results.status.label()
    );
    for type_result in &results.type_results {
        println!(
            "  {:<28} {:>3}/{:<3} {:>6.2}%  {}",
            type_result.type_name,
            type_result.score.raw_score,
            type_result.score.max_score,
            type_result.score.percentage,
            type_result.score.display_label()
        );
        for group in &type_result.groups {
            println!(
                "    - {:<24} {:>3}/{:<3} {:>6.2}%",
                group.group_name,
                group.score.raw_score,
                group.score.max_score,
                group.score.percentage
            );
        }
    }

    let overall = &results.overall_result;
    println!(
        "Overall: {:.2}% -> {}",
        overall.percentage, results.overall_label
    );
    if let Some(grade) = &overall.grade {
        println!(
            "  Grade {} ({}): {}",
            grade.grade.as_str(),
            grade.description,
            grade.insurance_decision()
        );
    }

    if breakdown {
        if let Some(rows) = &results.answer_breakdown {
            println!();
            for row in rows {
                println!(
                    "  [{}] {} -> {} ({}/{})",
                    row.group_name,
                    row.question_text,
                    row.selected_option.label(),
                    row.score_awarded,
                    row.max_score
                );
            }
        }
    }
}
