//! Publisher (C7): renders findings as inline comments or a single report,
//! and enforces the idempotency marker in both modes.

pub mod marker;
pub mod render;

use tracing::{info, warn};

use crate::errors::Result;
use crate::git_providers::{ChangeRequest, ChangeRequestId, DiffItem, InlinePosition, ProviderClient, Side};
use crate::review_item::{ReviewItem, ReviewType};

/// Selects how findings are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    Comment,
    Report,
}

/// Outcome of one publish run, used for the Notifier and response body.
#[derive(Debug, Default)]
pub struct PublishSummary {
    pub posted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Publishes `reviews` for one change request according to `mode`.
///
/// Individual comment failures are logged and skipped; the loop continues
/// (per C1's failure semantics — one bad post never aborts the others).
pub async fn publish(
    client: &ProviderClient,
    id: &ChangeRequestId,
    cr: &ChangeRequest,
    items: &[DiffItem],
    reviews: &[ReviewItem],
    mode: PublishMode,
) -> Result<PublishSummary> {
    match mode {
        PublishMode::Comment => publish_comments(client, id, cr, reviews).await,
        PublishMode::Report => publish_report(client, id, cr, items, reviews).await,
    }
}

async fn publish_comments(
    client: &ProviderClient,
    id: &ChangeRequestId,
    cr: &ChangeRequest,
    reviews: &[ReviewItem],
) -> Result<PublishSummary> {
    let mut summary = PublishSummary::default();

    let existing = match client.list_comments(id).await {
        Ok(comments) => comments
            .into_iter()
            .filter_map(|(comment_id, body)| marker::extract_key(&body).map(|key| (key, comment_id)))
            .collect::<std::collections::HashMap<_, _>>(),
        Err(e) => {
            warn!(error = %e, "failed to list existing comments; proceeding without idempotency guard");
            std::collections::HashMap::new()
        }
    };

    for review in reviews {
        let key = marker::item_key(review);
        let body = render::render_comment_body(review);

        if let Some(comment_id) = existing.get(&key) {
            match client.update_inline_comment(id, comment_id, &body).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    warn!(error = %e, path = ?review.new_path, line = review.end_line, "failed to update existing inline comment, continuing");
                    summary.failed += 1;
                }
            }
            continue;
        }

        let position = InlinePosition {
            new_path: review.new_path.clone(),
            old_path: review.old_path.clone(),
            line: review.end_line,
            side: match review.r#type {
                ReviewType::New => Side::Right,
                ReviewType::Old => Side::Left,
            },
            diff_refs: cr.diff_refs.clone(),
        };

        match client.post_inline_comment(id, &position, &body).await {
            Ok(()) => summary.posted += 1,
            Err(e) => {
                warn!(error = %e, path = ?review.new_path, line = review.end_line, "failed to post inline comment, continuing");
                summary.failed += 1;
            }
        }
    }

    info!(
        posted = summary.posted,
        updated = summary.updated,
        failed = summary.failed,
        "comment-mode publish finished"
    );
    Ok(summary)
}

async fn publish_report(
    client: &ProviderClient,
    id: &ChangeRequestId,
    cr: &ChangeRequest,
    items: &[DiffItem],
    reviews: &[ReviewItem],
) -> Result<PublishSummary> {
    let mut summary = PublishSummary::default();
    let body = render::render_report(cr, items, reviews);

    let existing = client.list_comments(id).await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list existing comments; proceeding without idempotency guard");
        Vec::new()
    });

    let report_key = marker::key_for("report");
    let existing_report = existing
        .into_iter()
        .find(|(_, b)| marker::extract_key(b).as_deref() == Some(report_key.as_str()));

    match existing_report {
        Some((comment_id, _)) => match client.update_general_comment(id, &comment_id, &body).await {
            Ok(()) => summary.updated += 1,
            Err(e) => {
                warn!(error = %e, "failed to update existing report comment");
                summary.failed += 1;
            }
        },
        None => match client.post_general_comment(id, &body).await {
            Ok(()) => summary.posted += 1,
            Err(e) => {
                warn!(error = %e, "failed to post report comment");
                summary.failed += 1;
            }
        },
    }

    Ok(summary)
}

