use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::assessments::catalog::{CatalogError, CatalogImportError};
use crate::assessments::cleanup::CleanupError;
use crate::assessments::repository::RepositoryError;
use crate::assessments::service::AssessmentError;
use crate::http::error_response;

pub(crate) fn assessment_error_response(err: AssessmentError) -> Response {
    match err {
        AssessmentError::Validation(issues) => {
            let payload = json!({
                "error": "validation_error",
                "message": format!("{} асуулт/талбар алдаатай байна.", issues.len()),
                "errors": issues,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        AssessmentError::Repository(repository) => repository_error_response(repository),
        other => {
            let status = match other {
                AssessmentError::NotFound | AssessmentError::MissingRecord(_) => {
                    StatusCode::NOT_FOUND
                }
                AssessmentError::Expired | AssessmentError::AlreadyCompleted => StatusCode::GONE,
                _ => StatusCode::BAD_REQUEST,
            };
            error_response(status, other.code(), other.message())
        }
    }
}

pub(crate) fn catalog_error_response(err: CatalogError) -> Response {
    match err {
        CatalogError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        CatalogError::Invalid(message) => invalid_request(message),
        CatalogError::Repository(repository) => repository_error_response(repository),
    }
}

pub(crate) fn import_error_response(err: CatalogImportError) -> Response {
    invalid_request(err.to_string())
}

pub(crate) fn repository_error_response(err: RepositoryError) -> Response {
    match err {
        RepositoryError::Conflict => {
            error_response(StatusCode::CONFLICT, "conflict", "record already exists")
        }
        RepositoryError::NotFound => {
            error_response(StatusCode::NOT_FOUND, "not_found", "record not found")
        }
        RepositoryError::Closed(reason) => {
            assessment_error_response(AssessmentError::from(reason))
        }
        missing @ RepositoryError::AttachmentMissing { .. } => {
            assessment_error_response(AssessmentError::from(missing))
        }
        RepositoryError::Unavailable(detail) => {
            error!(%detail, "store unavailable");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal server error",
            )
        }
    }
}

pub(crate) fn cleanup_error_response(err: CleanupError) -> Response {
    match err {
        CleanupError::InvalidAge => invalid_request(err.to_string()),
        CleanupError::Repository(repository) => repository_error_response(repository),
    }
}

pub(crate) fn invalid_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_request", message)
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> Response {
    invalid_request(rejection.body_text())
}

pub(crate) fn query_rejection(rejection: QueryRejection) -> Response {
    invalid_request(rejection.body_text())
}

/// Path ids that do not parse cannot name a stored record.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, Response> {
    raw.parse::<T>().map_err(|_| {
        error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{what} not found"),
        )
    })
}
