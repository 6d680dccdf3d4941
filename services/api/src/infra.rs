use metrics_exporter_prometheus::PrometheusHandle;
use risk_assessment::assessments::{
    AssessmentSettings, CatalogImportSummary, CatalogImporter, Clock, InMemorySurveyStore,
    SurveyState,
};
use risk_assessment::error::AppError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Survey services backed by the process-local store.
pub(crate) fn in_memory_survey_state(
    clock: Arc<dyn Clock>,
    settings: AssessmentSettings,
) -> SurveyState<InMemorySurveyStore> {
    let store = Arc::new(InMemorySurveyStore::new());
    SurveyState::new(store, clock, settings)
}

pub(crate) fn seed_catalog_from_path(
    state: &SurveyState<InMemorySurveyStore>,
    path: &Path,
) -> Result<CatalogImportSummary, AppError> {
    let rows = CatalogImporter::from_path(path)?;
    Ok(state.catalog.import(rows)?)
}

pub(crate) fn seed_catalog_from_str(
    state: &SurveyState<InMemorySurveyStore>,
    csv: &str,
) -> Result<CatalogImportSummary, AppError> {
    let rows = CatalogImporter::from_reader(csv.as_bytes())?;
    Ok(state.catalog.import(rows)?)
}
