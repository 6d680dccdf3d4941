use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;

use super::errors::{
    assessment_error_response, cleanup_error_response, invalid_request, json_rejection,
    parse_id, query_rejection,
};
use super::public::ResultsParams;
use super::SurveyState;
use crate::assessments::cleanup::{DraftCleanupRequest, ImageCleanupRequest};
use crate::assessments::domain::{
    AssessmentId, AssessmentStatus, RespondentId, RespondentKind,
};
use crate::assessments::repository::{RespondentFilter, SurveyStore};
use crate::assessments::service::{AssessmentQuery, CreateAssessmentRequest};
use crate::assessments::views::PageRequest;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssessmentListParams {
    #[serde(default)]
    pub odoo_id: Option<String>,
    #[serde(default)]
    pub respondent_id: Option<RespondentId>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RespondentListParams {
    #[serde(default)]
    pub kind: Option<RespondentKind>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Assessment issuing, listing, results, respondents and cleanup.
pub fn admin_router<S>(state: SurveyState<S>) -> Router
where
    S: SurveyStore + 'static,
{
    Router::new()
        .route(
            "/admin/assessments",
            get(list_assessments_handler::<S>).post(create_assessment_handler::<S>),
        )
        .route("/admin/assessments/:id", get(get_assessment_handler::<S>))
        .route(
            "/admin/assessments/:id/results",
            get(assessment_results_handler::<S>),
        )
        .route("/admin/respondents", get(list_respondents_handler::<S>))
        .route("/admin/respondents/:id", get(get_respondent_handler::<S>))
        .route("/admin/cleanup/drafts", delete(cleanup_drafts_handler::<S>))
        .route("/admin/cleanup/images", delete(cleanup_images_handler::<S>))
        .with_state(state)
}

pub(crate) async fn create_assessment_handler<S>(
    State(state): State<SurveyState<S>>,
    payload: Result<axum::Json<CreateAssessmentRequest>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let axum::Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection(rejection),
    };
    match state.assessments.create_assessment(request) {
        Ok(created) => (StatusCode::CREATED, axum::Json(created)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn list_assessments_handler<S>(
    State(state): State<SurveyState<S>>,
    params: Result<Query<AssessmentListParams>, QueryRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return query_rejection(rejection),
    };
    let page = match PageRequest::new(params.page, params.page_size) {
        Ok(page) => page,
        Err(message) => return invalid_request(message),
    };
    let query = AssessmentQuery {
        odoo_id: params.odoo_id.filter(|value| !value.trim().is_empty()),
        respondent_id: params.respondent_id,
        employee_id: params.employee_id.filter(|value| !value.trim().is_empty()),
        status: params.status,
    };

    match state.assessments.list_assessments(query, page) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn get_assessment_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: AssessmentId = match parse_id(&raw_id, "assessment") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.assessments.get_assessment(&id) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn assessment_results_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    params: Option<Query<ResultsParams>>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: AssessmentId = match parse_id(&raw_id, "assessment") {
        Ok(id) => id,
        Err(response) => return response,
    };
    let breakdown = params.map(|Query(params)| params.breakdown).unwrap_or(false);
    match state.assessments.results_for_assessment(&id, breakdown) {
        Ok(results) => (StatusCode::OK, axum::Json(results)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn list_respondents_handler<S>(
    State(state): State<SurveyState<S>>,
    params: Result<Query<RespondentListParams>, QueryRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return query_rejection(rejection),
    };
    let page = match PageRequest::new(params.page, params.page_size) {
        Ok(page) => page,
        Err(message) => return invalid_request(message),
    };
    let filter = RespondentFilter {
        kind: params.kind,
        search: params.search.filter(|value| !value.trim().is_empty()),
    };

    match state.assessments.list_respondents(filter, page) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn get_respondent_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: RespondentId = match parse_id(&raw_id, "respondent") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.assessments.get_respondent(&id) {
        Ok(respondent) => (StatusCode::OK, axum::Json(respondent)).into_response(),
        Err(err) => assessment_error_response(err),
    }
}

pub(crate) async fn cleanup_drafts_handler<S>(
    State(state): State<SurveyState<S>>,
    params: Result<Query<DraftCleanupRequest>, QueryRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let Query(request) = match params {
        Ok(params) => params,
        Err(rejection) => return query_rejection(rejection),
    };
    match state.cleanup.cleanup_drafts(request) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => cleanup_error_response(err),
    }
}

pub(crate) async fn cleanup_images_handler<S>(
    State(state): State<SurveyState<S>>,
    params: Result<Query<ImageCleanupRequest>, QueryRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let Query(request) = match params {
        Ok(params) => params,
        Err(rejection) => return query_rejection(rejection),
    };
    match state.cleanup.cleanup_images(request) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => cleanup_error_response(err),
    }
}
