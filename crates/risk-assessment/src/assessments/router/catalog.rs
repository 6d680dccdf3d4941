use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::errors::{
    catalog_error_response, import_error_response, json_rejection, parse_id,
};
use super::SurveyState;
use crate::assessments::catalog::{
    CatalogImporter, NewQuestion, NewQuestionGroup, NewQuestionnaireType, QuestionGroupUpdate,
    QuestionOptions, QuestionUpdate, QuestionnaireTypeUpdate,
};
use crate::assessments::domain::{GroupId, QuestionId, TypeId};
use crate::assessments::repository::SurveyStore;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TypeListParams {
    #[serde(default)]
    pub active_only: bool,
}

/// Catalog administration: types, groups, questions, option rules and CSV import.
pub fn catalog_router<S>(state: SurveyState<S>) -> Router
where
    S: SurveyStore + 'static,
{
    Router::new()
        .route(
            "/admin/types",
            get(list_types_handler::<S>).post(create_type_handler::<S>),
        )
        .route(
            "/admin/types/:id",
            get(type_detail_handler::<S>)
                .patch(update_type_handler::<S>)
                .delete(deactivate_type_handler::<S>),
        )
        .route(
            "/admin/types/:id/groups",
            get(list_groups_handler::<S>).post(create_group_handler::<S>),
        )
        .route(
            "/admin/groups/:id",
            get(get_group_handler::<S>)
                .patch(update_group_handler::<S>)
                .delete(deactivate_group_handler::<S>),
        )
        .route(
            "/admin/groups/:id/questions",
            get(list_questions_handler::<S>).post(create_question_handler::<S>),
        )
        .route(
            "/admin/questions/:id",
            get(get_question_handler::<S>)
                .patch(update_question_handler::<S>)
                .delete(deactivate_question_handler::<S>),
        )
        .route(
            "/admin/questions/:id/options",
            put(set_options_handler::<S>),
        )
        .route("/admin/catalog/import", post(import_handler::<S>))
        .with_state(state)
}

macro_rules! take {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

macro_rules! take_json {
    ($payload:expr) => {
        match $payload {
            Ok(axum::Json(value)) => value,
            Err(rejection) => return json_rejection(rejection),
        }
    };
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, crate::assessments::catalog::CatalogError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => catalog_error_response(err),
    }
}

pub(crate) async fn create_type_handler<S>(
    State(state): State<SurveyState<S>>,
    payload: Result<axum::Json<NewQuestionnaireType>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let input = take_json!(payload);
    respond(StatusCode::CREATED, state.catalog.create_type(input))
}

pub(crate) async fn list_types_handler<S>(
    State(state): State<SurveyState<S>>,
    params: Option<Query<TypeListParams>>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let active_only = params.map(|Query(params)| params.active_only).unwrap_or(false);
    respond(StatusCode::OK, state.catalog.list_types(active_only))
}

pub(crate) async fn type_detail_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: TypeId = take!(parse_id(&raw_id, "questionnaire type"));
    respond(StatusCode::OK, state.catalog.type_detail(&id))
}

pub(crate) async fn update_type_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<QuestionnaireTypeUpdate>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: TypeId = take!(parse_id(&raw_id, "questionnaire type"));
    let update = take_json!(payload);
    respond(StatusCode::OK, state.catalog.update_type(&id, update))
}

pub(crate) async fn deactivate_type_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: TypeId = take!(parse_id(&raw_id, "questionnaire type"));
    respond(StatusCode::OK, state.catalog.deactivate_type(&id))
}

pub(crate) async fn create_group_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<NewQuestionGroup>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let type_id: TypeId = take!(parse_id(&raw_id, "questionnaire type"));
    let input = take_json!(payload);
    respond(StatusCode::CREATED, state.catalog.create_group(&type_id, input))
}

pub(crate) async fn list_groups_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let type_id: TypeId = take!(parse_id(&raw_id, "questionnaire type"));
    respond(StatusCode::OK, state.catalog.list_groups(&type_id))
}

pub(crate) async fn get_group_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: GroupId = take!(parse_id(&raw_id, "question group"));
    respond(StatusCode::OK, state.catalog.get_group(&id))
}

pub(crate) async fn update_group_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<QuestionGroupUpdate>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: GroupId = take!(parse_id(&raw_id, "question group"));
    let update = take_json!(payload);
    respond(StatusCode::OK, state.catalog.update_group(&id, update))
}

pub(crate) async fn deactivate_group_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: GroupId = take!(parse_id(&raw_id, "question group"));
    respond(StatusCode::OK, state.catalog.deactivate_group(&id))
}

pub(crate) async fn create_question_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<NewQuestion>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let group_id: GroupId = take!(parse_id(&raw_id, "question group"));
    let input = take_json!(payload);
    respond(StatusCode::CREATED, state.catalog.create_question(&group_id, input))
}

pub(crate) async fn list_questions_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let group_id: GroupId = take!(parse_id(&raw_id, "question group"));
    respond(StatusCode::OK, state.catalog.list_questions(&group_id))
}

pub(crate) async fn get_question_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: QuestionId = take!(parse_id(&raw_id, "question"));
    respond(StatusCode::OK, state.catalog.get_question(&id))
}

pub(crate) async fn update_question_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<QuestionUpdate>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: QuestionId = take!(parse_id(&raw_id, "question"));
    let update = take_json!(payload);
    respond(StatusCode::OK, state.catalog.update_question(&id, update))
}

pub(crate) async fn deactivate_question_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: QuestionId = take!(parse_id(&raw_id, "question"));
    respond(StatusCode::OK, state.catalog.deactivate_question(&id))
}

pub(crate) async fn set_options_handler<S>(
    State(state): State<SurveyState<S>>,
    Path(raw_id): Path<String>,
    payload: Result<axum::Json<QuestionOptions>, JsonRejection>,
) -> Response
where
    S: SurveyStore + 'static,
{
    let id: QuestionId = take!(parse_id(&raw_id, "question"));
    let options = take_json!(payload);
    respond(StatusCode::OK, state.catalog.set_options(&id, options))
}

/// Body is the CSV document itself.
pub(crate) async fn import_handler<S>(State(state): State<SurveyState<S>>, body: String) -> Response
where
    S: SurveyStore + 'static,
{
    let rows = match CatalogImporter::from_reader(body.as_bytes()) {
        Ok(rows) => rows,
        Err(err) => return import_error_response(err),
    };
    respond(StatusCode::CREATED, state.catalog.import(rows))
}
