//! HTTP surface of the assessment workflow.
//!
//! Respondent routes under `/a/:token` are rate limited per client; admin
//! routes under `/admin` require an `X-API-Key` header.

mod admin;
mod catalog;
pub(crate) mod errors;
mod public;

use std::sync::Arc;

use axum::middleware;
use axum::Router;

use super::catalog::CatalogService;
use super::cleanup::CleanupService;
use super::clock::Clock;
use super::repository::SurveyStore;
use super::service::{AssessmentService, AssessmentSettings};
use crate::http::{rate_limit, require_api_key, AdminKeys, RateLimiter};

pub use admin::admin_router;
pub use catalog::catalog_router;
pub use public::public_router;

/// Services shared by every survey handler.
pub struct SurveyState<S> {
    pub assessments: Arc<AssessmentService<S>>,
    pub catalog: Arc<CatalogService<S>>,
    pub cleanup: Arc<CleanupService<S>>,
}

impl<S> Clone for SurveyState<S> {
    fn clone(&self) -> Self {
        Self {
            assessments: Arc::clone(&self.assessments),
            catalog: Arc::clone(&self.catalog),
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

impl<S> SurveyState<S>
where
    S: SurveyStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: AssessmentSettings) -> Self {
        Self {
            assessments: Arc::new(AssessmentService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                settings,
            )),
            catalog: Arc::new(CatalogService::new(Arc::clone(&store), Arc::clone(&clock))),
            cleanup: Arc::new(CleanupService::new(store, clock)),
        }
    }
}

/// Full survey API: rate-limited respondent routes plus key-guarded admin routes.
pub fn survey_router<S>(state: SurveyState<S>, keys: AdminKeys, limiter: Arc<RateLimiter>) -> Router
where
    S: SurveyStore + 'static,
{
    let public = public_router(state.clone())
        .layer(middleware::from_fn_with_state(limiter, rate_limit));
    let admin = admin_router(state.clone())
        .merge(catalog_router(state))
        .layer(middleware::from_fn_with_state(keys, require_api_key));

    Router::new().merge(public).merge(admin)
}
