use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::{AssessmentId, AttachmentId};
use super::repository::{RepositoryError, SurveyStore};

/// Largest look-back accepted for a cleanup cutoff.
pub const MAX_CLEANUP_DAYS: u32 = 36_500;

fn default_older_than_days() -> u32 {
    30
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("older_than_days must be at most {MAX_CLEANUP_DAYS}")]
    InvalidAge,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftCleanupRequest {
    #[serde(default = "default_older_than_days")]
    pub older_than_days: u32,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DraftCleanupRequest {
    fn default() -> Self {
        Self {
            older_than_days: default_older_than_days(),
            include_images: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCleanupRequest {
    #[serde(default = "default_older_than_days")]
    pub older_than_days: u32,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ImageCleanupRequest {
    fn default() -> Self {
        Self {
            older_than_days: default_older_than_days(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupDetail {
    pub assessment_id: AssessmentId,
    pub expired_at: DateTime<Utc>,
    pub draft_size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftCleanupReport {
    pub drafts_deleted: usize,
    pub assessments_affected: usize,
    pub images_deleted: usize,
    pub storage_freed_bytes: u64,
    pub dry_run: bool,
    pub details: Vec<CleanupDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCleanupReport {
    pub images_deleted: usize,
    pub storage_freed_bytes: u64,
    pub dry_run: bool,
}

/// Admin-triggered removal of abandoned drafts and orphaned uploads.
pub struct CleanupService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> CleanupService<S>
where
    S: SurveyStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn cutoff(&self, older_than_days: u32) -> Result<DateTime<Utc>, CleanupError> {
        if older_than_days > MAX_CLEANUP_DAYS {
            return Err(CleanupError::InvalidAge);
        }
        self.clock
            .now()
            .checked_sub_signed(Duration::days(i64::from(older_than_days)))
            .ok_or(CleanupError::InvalidAge)
    }

    /// Drops drafts of non-completed assessments that expired before the cutoff.
    /// Reported storage is the serialized draft size plus any deleted images.
    pub fn cleanup_drafts(
        &self,
        request: DraftCleanupRequest,
    ) -> Result<DraftCleanupReport, CleanupError> {
        let stale = self.store.stale_drafts(self.cutoff(request.older_than_days)?)?;

        let mut report = DraftCleanupReport {
            assessments_affected: stale.len(),
            dry_run: request.dry_run,
            ..DraftCleanupReport::default()
        };
        for (draft, record) in &stale {
            let draft_size_bytes = serde_json::to_vec(&draft.data)
                .map(|bytes| bytes.len() as u64)
                .unwrap_or_default();
            report.storage_freed_bytes += draft_size_bytes;
            report.details.push(CleanupDetail {
                assessment_id: record.id,
                expired_at: record.expires_at,
                draft_size_bytes,
            });
        }

        if request.dry_run || stale.is_empty() {
            info!(
                candidates = stale.len(),
                dry_run = request.dry_run,
                "draft cleanup previewed"
            );
            return Ok(report);
        }

        let assessment_ids: Vec<AssessmentId> =
            stale.iter().map(|(_, record)| record.id).collect();
        if request.include_images {
            let mut attachment_ids: Vec<AttachmentId> = Vec::new();
            for assessment_id in &assessment_ids {
                attachment_ids.extend(
                    self.store
                        .attachments_for_assessment(assessment_id)?
                        .into_iter()
                        .filter(|attachment| attachment.answer_id.is_none())
                        .map(|attachment| attachment.id),
                );
            }
            let removed = self.store.delete_attachments(&attachment_ids)?;
            report.images_deleted = removed.len();
            report.storage_freed_bytes += removed
                .iter()
                .map(|attachment| attachment.size_bytes)
                .sum::<u64>();
        }
        report.drafts_deleted = self.store.delete_drafts(&assessment_ids)?;

        info!(
            drafts_deleted = report.drafts_deleted,
            images_deleted = report.images_deleted,
            storage_freed_bytes = report.storage_freed_bytes,
            "draft cleanup finished"
        );
        Ok(report)
    }

    /// Removes uploads never linked to an answer and older than the cutoff.
    pub fn cleanup_images(
        &self,
        request: ImageCleanupRequest,
    ) -> Result<ImageCleanupReport, CleanupError> {
        let orphaned = self
            .store
            .unlinked_attachments(self.cutoff(request.older_than_days)?)?;

        if request.dry_run {
            return Ok(ImageCleanupReport {
                images_deleted: 0,
                storage_freed_bytes: orphaned.iter().map(|attachment| attachment.size_bytes).sum(),
                dry_run: true,
            });
        }

        let ids: Vec<AttachmentId> = orphaned.iter().map(|attachment| attachment.id).collect();
        let removed = self.store.delete_attachments(&ids)?;
        let report = ImageCleanupReport {
            images_deleted: removed.len(),
            storage_freed_bytes: removed.iter().map(|attachment| attachment.size_bytes).sum(),
            dry_run: false,
        };

        info!(
            images_deleted = report.images_deleted,
            storage_freed_bytes = report.storage_freed_bytes,
            "image cleanup finished"
        );
        Ok(report)
    }
}
