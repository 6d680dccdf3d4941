use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::errors::{assessment_error_response, invalid_request};
use super::SurveyState;
use crate::assessments::domain::{DraftData, QuestionId, SubmissionRequest};
use crate::assessments::repository::SurveyStore;
use crate::assessments::service::UploadRequest;

/// Multipart framing allowance on top of the configured file size.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultsParams {
    #[serde(default)]
    pub breakdown: bool,
}

/// Token-authenticated respondent endpoints.
pub fn public_router<S>(state: SurveyState<S>) -> Router
where
    S: SurveyStore + 'static,
{
    let upload_limit = (state.assessments.settings().upload_max_mb as usize) * 1024 * 1024
        + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/a/:token", get(form_handler::<S>))
        .route(
            "/a/:token/draft",
            get(load_draft_handler::<S>).put(save_draft_handler::<S>),
        )
        .route(
            "/a/:token/upload",
            post(upload_handler::<S>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/a/:token/submit", post(submit_handler::<S>))
        .route("/a/:token/results", get(results_handler::<S>))
        .with_state(state)
}

/// Resolves the link before the body is read so unknown or closed links
/// answer the same way whatever was sent.
fn token_then_body<S, T>(
    state: &SurveyState<S>,
    token: &str,
    body: &Bytes,
) -> Result<T, Response>
where
    S: SurveyStore + 'static,
    T: DeserializeOwned,
{
    state
        .assessments
        .check_token(token)
        .map_err(assessment_error_response)?;
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "request body rejected");
        invalid_request(format!("Failed to parse the request body as JSON: {err}"))
    })
}

pub(crate) async fn form_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    match state.assessments.fetch_form(&token) {
        Ok(form) => (StatusCode::OK, axum::Json(form)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn load_draft_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    match state.assessments.load_draft(&token) {
        Ok(Some(draft)) => (StatusCode::OK, axum::Json(draft)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn save_draft_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response
where
    S: SurveyStore + 'static,
{
    let data: DraftData = match token_then_body(&state, &token, &body) {
        Ok(data) => data,
        Err(response) => return response,
    };
    match state.assessments.save_draft(&token, data) {
        Ok(saved) => (StatusCode::OK, axum::Json(saved)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn upload_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    if let Err(err) = state.assessments.check_token(&token) {
        return assessment_error_response(err);
    }
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return invalid_request(rejection.body_text()),
    };

    let mut question_id: Option<QuestionId> = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "multipart upload rejected");
                return invalid_request(format!("malformed upload: {}", err.body_text()));
            }
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("question_id") => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(err) => return invalid_request(err.body_text()),
                };
                match raw.parse::<QuestionId>() {
                    Ok(id) => question_id = Some(id),
                    Err(_) => return invalid_request("question_id must be a UUID"),
                }
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, content_type, bytes.to_vec())),
                    Err(err) => return invalid_request(err.body_text()),
                }
            }
            _ => {}
        }
    }

    let Some(question_id) = question_id else {
        return invalid_request("question_id is required");
    };
    let Some((file_name, content_type, bytes)) = file else {
        return invalid_request("file is required");
    };

    let upload = UploadRequest {
        question_id,
        file_name,
        content_type,
        bytes,
    };
    match state.assessments.upload_attachment(&token, upload) {
        Ok(attachment) => (StatusCode::OK, axum::Json(attachment)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn submit_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response
where
    S: SurveyStore + 'static,
{
    let request: SubmissionRequest = match token_then_body(&state, &token, &body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.assessments.submit(&token, request) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn results_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(token): Path<String>,
    params: Option<Query<ResultsParams>>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let breakdown = params.map(|Query(params)| params.breakdown).unwrap_or(false);
    match state.assessments.results_for_token(&token, breakdown) {
        Ok(results) => (StatusCode::OK, axum::Json(results)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}
