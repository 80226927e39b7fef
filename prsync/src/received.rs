//! Review-received policy: one follow-up task per authored PR, always for its
//! newest review.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info, instrument, warn};

use crate::core::priority::priority_for;
use crate::core::received_plan::{
    DetailVerdict, ReviewVerdict, assess_detail, assess_reviews, departed_entries,
};
use crate::core::state::ReceivedEntry;
use crate::core::types::{Policy, RemotePr, Review, ReviewKind};
use crate::io::github::{AUTHORED_QUERY, ReviewHost};
use crate::io::todoist::TaskStore;
use crate::sync::{CloseReason, PolicyReport, RunContext, log_close_failure};

/// Reconcile `tracked` (PR URL -> entry) against the viewer's open PRs.
///
/// At most one open task exists per PR at any time: a previous task is closed
/// before its replacement is created, and a failed close blocks the creation.
#[instrument(skip_all, fields(policy = %Policy::ReviewReceived))]
pub fn reconcile_reviews_received<H: ReviewHost, T: TaskStore>(
    ctx: &mut RunContext<'_, H>,
    tasks: &T,
    tracked: &mut BTreeMap<String, ReceivedEntry>,
) -> PolicyReport {
    let mut report = PolicyReport::default();
    let snapshot = match ctx.host().search_open_prs(AUTHORED_QUERY) {
        Ok(prs) => prs,
        Err(err) => {
            error!(error = %err, tracked = tracked.len(), "snapshot fetch failed; skipping policy");
            report.aborted = true;
            return report;
        }
    };

    let mut open_urls = BTreeSet::new();
    for pr in &snapshot {
        if !open_urls.insert(pr.url.clone()) {
            continue;
        }
        let detail = match ctx.pr_detail(pr) {
            Ok(detail) => detail,
            Err(err) => {
                warn!(url = %pr.url, error = %err, "detail fetch failed; skipping PR this run");
                continue;
            }
        };
        match assess_detail(&detail) {
            DetailVerdict::Merged => {
                close_open_task(tasks, tracked, &pr.url, CloseReason::Merged, &mut report);
                continue;
            }
            DetailVerdict::ReviewRequestedAgain => {
                close_open_task(
                    tasks,
                    tracked,
                    &pr.url,
                    CloseReason::ReviewRequestedAgain,
                    &mut report,
                );
                continue;
            }
            DetailVerdict::InspectReviews => {}
        }

        let reviews = match ctx.host().reviews(&pr.repo, pr.number) {
            Ok(reviews) => reviews,
            Err(err) => {
                warn!(url = %pr.url, error = %err, "reviews fetch failed; treating as no reviews");
                Vec::new()
            }
        };
        match assess_reviews(tracked.get(&pr.url), &reviews) {
            ReviewVerdict::NoReviews => debug!(url = %pr.url, "no reviews yet"),
            ReviewVerdict::Unchanged => debug!(url = %pr.url, "latest review already mirrored"),
            ReviewVerdict::Replace(latest) => {
                replace_task(ctx, tasks, tracked, pr, latest, &mut report);
            }
        }
    }

    for url in departed_entries(tracked, &open_urls) {
        if close_open_task(tasks, tracked, &url, CloseReason::PrClosed, &mut report) {
            debug!(url = %url, "PR left the open snapshot; untracking");
            tracked.remove(&url);
        }
    }

    report
}

/// Close the entry's open task, if any, and clear its task id.
///
/// Returns `false` only when a close was attempted and failed; the entry is
/// then left untouched so the close is retried next run.
fn close_open_task<T: TaskStore>(
    tasks: &T,
    tracked: &mut BTreeMap<String, ReceivedEntry>,
    url: &str,
    reason: CloseReason,
    report: &mut PolicyReport,
) -> bool {
    let Some(entry) = tracked.get_mut(url) else {
        return true;
    };
    let Some(task_id) = entry.task_id.clone() else {
        return true;
    };
    match tasks.close_task(&task_id) {
        Ok(()) => {
            info!(url, task_id = %task_id, reason = reason.as_str(), "closed task");
            entry.task_id = None;
            report.closed += 1;
            true
        }
        Err(err) => {
            log_close_failure(url, &task_id, reason, &err);
            report.failures += 1;
            false
        }
    }
}

fn replace_task<H: ReviewHost, T: TaskStore>(
    ctx: &RunContext<'_, H>,
    tasks: &T,
    tracked: &mut BTreeMap<String, ReceivedEntry>,
    pr: &RemotePr,
    latest: &Review,
    report: &mut PolicyReport,
) {
    if !close_open_task(tasks, tracked, &pr.url, CloseReason::Superseded, report) {
        return;
    }
    let text = match ctx.templates().review_received(pr, latest) {
        Ok(text) => text,
        Err(err) => {
            warn!(url = %pr.url, error = %format!("{err:#}"), "cannot render task text");
            report.failures += 1;
            return;
        }
    };
    let kind = ReviewKind::classify(&latest.state);
    let task = ctx.new_task(text, priority_for(Policy::ReviewReceived, Some(kind)));
    match tasks.create_task(&task) {
        Ok(task_id) => {
            info!(
                url = %pr.url,
                task_id = %task_id,
                review_id = latest.id,
                kind = kind.as_str(),
                "created follow-up task"
            );
            let entry = tracked.entry(pr.url.clone()).or_default();
            entry.task_id = Some(task_id);
            entry.last_review_id = Some(latest.id);
            report.created += 1;
        }
        Err(err) => {
            // Keep the old review id so the next run retries the creation.
            warn!(url = %pr.url, review_id = latest.id, error = %err, "task creation failed; will retry next run");
            report.failures += 1;
        }
    }
}
