use chrono::Duration;

use super::common::*;
use crate::assessments::cleanup::{
    CleanupError, DraftCleanupRequest, ImageCleanupRequest, MAX_CLEANUP_DAYS,
};
use crate::assessments::clock::Clock;
use crate::assessments::domain::{AssessmentId, DraftAnswer, DraftData, OptionKind};
use crate::assessments::repository::{AssessmentRepository, AttachmentStore};
use crate::assessments::service::UploadRequest;

struct Scenario {
    harness: Harness,
    stale_id: AssessmentId,
    live_id: AssessmentId,
}

/// One link that expired after a day and one still open, both with drafts
/// and one unlinked upload each, observed 40 days later.
fn scenario() -> Scenario {
    let harness = harness();
    let seed = seed_catalog(&harness);
    let service = &harness.state.assessments;

    let mut short = create_request(&seed, Some("odoo-stale"));
    short.expires_in_days = Some(1);
    let stale = service.create_assessment(short).expect("stale link");
    let stale_token = token_from_url(&stale.url);

    let mut long = create_request(&seed, Some("odoo-live"));
    long.expires_in_days = Some(60);
    let live = service.create_assessment(long).expect("live link");
    let live_token = token_from_url(&live.url);

    let draft = DraftData {
        answers: vec![DraftAnswer {
            question_id: seed.first,
            selected_option: Some(OptionKind::Yes),
            comment: None,
            attachment_ids: Vec::new(),
        }],
        ..DraftData::default()
    };
    for token in [&stale_token, &live_token] {
        service.save_draft(token, draft.clone()).expect("draft saved");
        service
            .upload_attachment(
                token,
                UploadRequest {
                    question_id: seed.first,
                    file_name: "photo.jpg".to_string(),
                    content_type: Some("image/jpeg".to_string()),
                    bytes: vec![0xff; 256],
                },
            )
            .expect("upload");
    }

    harness.clock.advance(Duration::days(40));
    Scenario {
        harness,
        stale_id: stale.id,
        live_id: live.id,
    }
}

#[test]
fn dry_run_reports_without_deleting() {
    let scenario = scenario();
    let store = &scenario.harness.store;

    let report = scenario
        .harness
        .state
        .cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: 30,
            include_images: true,
            dry_run: true,
        })
        .expect("cleanup");

    assert!(report.dry_run);
    assert_eq!(report.assessments_affected, 1);
    assert_eq!(report.drafts_deleted, 0);
    assert_eq!(report.images_deleted, 0);
    assert_eq!(report.details.len(), 1);
    assert_eq!(report.details[0].assessment_id, scenario.stale_id);
    assert!(report.storage_freed_bytes > 0);
    assert!(store
        .fetch_draft(&scenario.stale_id)
        .expect("lookup")
        .is_some());
}

#[test]
fn deletes_only_drafts_of_long_expired_links() {
    let scenario = scenario();
    let store = &scenario.harness.store;

    let report = scenario
        .harness
        .state
        .cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: 30,
            include_images: false,
            dry_run: false,
        })
        .expect("cleanup");

    assert_eq!(report.drafts_deleted, 1);
    assert_eq!(report.images_deleted, 0);
    assert!(store.fetch_draft(&scenario.stale_id).expect("lookup").is_none());
    assert!(store.fetch_draft(&scenario.live_id).expect("lookup").is_some());
    assert_eq!(
        store
            .attachments_for_assessment(&scenario.stale_id)
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn include_images_removes_unlinked_uploads_of_affected_links() {
    let scenario = scenario();
    let store = &scenario.harness.store;
    let draft_bytes = scenario
        .harness
        .state
        .cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: 30,
            include_images: true,
            dry_run: true,
        })
        .expect("preview")
        .storage_freed_bytes;

    let report = scenario
        .harness
        .state
        .cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: 30,
            include_images: true,
            dry_run: false,
        })
        .expect("cleanup");

    assert_eq!(report.images_deleted, 1);
    assert_eq!(report.storage_freed_bytes, draft_bytes + 256);
    assert!(store
        .attachments_for_assessment(&scenario.stale_id)
        .expect("list")
        .is_empty());
    assert_eq!(
        store
            .attachments_for_assessment(&scenario.live_id)
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn image_cleanup_targets_old_unlinked_uploads() {
    let scenario = scenario();
    let cleanup = &scenario.harness.state.cleanup;

    let preview = cleanup
        .cleanup_images(ImageCleanupRequest {
            older_than_days: 30,
            dry_run: true,
        })
        .expect("preview");
    assert_eq!(preview.images_deleted, 0);
    assert_eq!(preview.storage_freed_bytes, 512);

    let untouched = cleanup
        .cleanup_images(ImageCleanupRequest {
            older_than_days: 45,
            dry_run: false,
        })
        .expect("nothing old enough");
    assert_eq!(untouched.images_deleted, 0);

    let report = cleanup
        .cleanup_images(ImageCleanupRequest::default())
        .expect("cleanup");
    assert_eq!(report.images_deleted, 2);
    assert_eq!(report.storage_freed_bytes, 512);
    assert!(scenario
        .harness
        .store
        .unlinked_attachments(scenario.harness.clock.now())
        .expect("list")
        .is_empty());
}

#[test]
fn out_of_range_ages_are_rejected_without_touching_the_store() {
    let scenario = scenario();
    let cleanup = &scenario.harness.state.cleanup;

    let err = cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: u32::MAX,
            include_images: true,
            dry_run: false,
        })
        .expect_err("age out of range");
    assert!(matches!(err, CleanupError::InvalidAge));

    let err = cleanup
        .cleanup_images(ImageCleanupRequest {
            older_than_days: MAX_CLEANUP_DAYS + 1,
            dry_run: false,
        })
        .expect_err("age out of range");
    assert!(matches!(err, CleanupError::InvalidAge));

    assert!(scenario
        .harness
        .store
        .fetch_draft(&scenario.stale_id)
        .expect("lookup")
        .is_some());

    let report = cleanup
        .cleanup_drafts(DraftCleanupRequest {
            older_than_days: MAX_CLEANUP_DAYS,
            include_images: false,
            dry_run: true,
        })
        .expect("largest age accepted");
    assert_eq!(report.assessments_affected, 0);
}
