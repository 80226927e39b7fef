//! Review-request policy: one task per PR awaiting the viewer's review.

use std::collections::BTreeMap;

use tracing::{debug, error, info, instrument, warn};

use crate::core::priority::priority_for;
use crate::core::request_plan::{Confirmation, confirm_direct, partition_snapshot, stale_entries};
use crate::core::types::{Policy, TaskId};
use crate::io::github::{REVIEW_REQUESTED_QUERY, ReviewHost};
use crate::io::todoist::TaskStore;
use crate::sync::{CloseReason, PolicyReport, RunContext, log_close_failure};

/// Reconcile `tracked` (PR URL -> task id) against the current review requests.
///
/// A failed snapshot aborts the policy before any task is touched. Entries
/// are only dropped once their task has been closed.
#[instrument(skip_all, fields(policy = %Policy::ReviewRequest))]
pub fn reconcile_review_requests<H: ReviewHost, T: TaskStore>(
    ctx: &mut RunContext<'_, H>,
    tasks: &T,
    tracked: &mut BTreeMap<String, TaskId>,
) -> PolicyReport {
    let mut report = PolicyReport::default();
    let snapshot = match ctx.host().search_open_prs(REVIEW_REQUESTED_QUERY) {
        Ok(prs) => prs,
        Err(err) => {
            error!(error = %err, tracked = tracked.len(), "snapshot fetch failed; skipping policy");
            report.aborted = true;
            return report;
        }
    };

    let partition = partition_snapshot(&snapshot, tracked);
    let mut valid = partition.tracked.clone();
    debug!(
        open = snapshot.len(),
        tracked = partition.tracked.len(),
        new = partition.new.len(),
        "partitioned snapshot"
    );

    for pr in partition.new {
        let confirmation = match ctx.pr_detail(pr) {
            Ok(detail) => {
                let viewer = ctx.viewer_login();
                confirm_direct(Some(&detail), viewer.as_deref())
            }
            Err(err) => {
                warn!(url = %pr.url, error = %err, "detail fetch failed; including PR");
                confirm_direct(None, None)
            }
        };
        if !confirmation.includes() {
            debug!(url = %pr.url, "review requested through a team only; skipping");
            continue;
        }
        if confirmation == Confirmation::Unverified {
            debug!(url = %pr.url, "direct request unverified; including PR");
        }
        valid.insert(pr.url.clone());

        let text = match ctx.templates().review_request(pr) {
            Ok(text) => text,
            Err(err) => {
                warn!(url = %pr.url, error = %format!("{err:#}"), "cannot render task text");
                report.failures += 1;
                continue;
            }
        };
        let task = ctx.new_task(text, priority_for(Policy::ReviewRequest, None));
        match tasks.create_task(&task) {
            Ok(task_id) => {
                info!(url = %pr.url, task_id = %task_id, "created review task");
                tracked.insert(pr.url.clone(), task_id);
                report.created += 1;
            }
            Err(err) => {
                warn!(url = %pr.url, error = %err, "task creation failed; will retry next run");
                report.failures += 1;
            }
        }
    }

    for (url, task_id) in stale_entries(tracked, &valid) {
        match tasks.close_task(&task_id) {
            Ok(()) => {
                info!(
                    url = %url,
                    task_id = %task_id,
                    reason = CloseReason::RequestWithdrawn.as_str(),
                    "closed task"
                );
                tracked.remove(&url);
                report.closed += 1;
            }
            Err(err) => {
                log_close_failure(&url, &task_id, CloseReason::RequestWithdrawn, &err);
                report.failures += 1;
            }
        }
    }

    report
}
