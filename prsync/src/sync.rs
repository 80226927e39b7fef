//! Orchestration for a single `prsync sync` run.
//!
//! A run is one linear pipeline: load state, reconcile review requests,
//! reconcile reviews received, save state. Both policies share one
//! [`RunContext`], which memoizes PR detail and the viewer's login for the
//! duration of the run.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::core::content::{TaskTemplates, TaskText};
use crate::core::types::{NewTask, Policy, PrDetail, Priority, RemotePr, TaskId};
use crate::io::github::ReviewHost;
use crate::io::http::RemoteError;
use crate::io::state_store::StateStore;
use crate::io::todoist::TaskStore;
use crate::received::reconcile_reviews_received;
use crate::requests::reconcile_review_requests;

/// Destination and scheduling fields copied onto every created task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDefaults {
    pub project_id: Option<String>,
    pub section_id: Option<String>,
    pub due_string: Option<String>,
}

/// Which policies a run reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicySelection {
    #[default]
    All,
    Only(Policy),
}

impl PolicySelection {
    pub fn includes(self, policy: Policy) -> bool {
        match self {
            PolicySelection::All => true,
            PolicySelection::Only(only) => only == policy,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub policies: PolicySelection,
    pub task_defaults: TaskDefaults,
    /// Write the state document back at the end of the run.
    pub persist_state: bool,
}

/// Counters for one policy run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyReport {
    /// The snapshot fetch failed; nothing was created or closed.
    pub aborted: bool,
    pub created: usize,
    pub closed: usize,
    /// Create or close calls that failed and will be retried next run.
    pub failures: usize,
}

/// Result of a whole run. `None` reports mean the policy was not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub review_requests: Option<PolicyReport>,
    pub reviews_received: Option<PolicyReport>,
    pub state_saved: bool,
}

/// Why a task is being closed. Logged with every close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    RequestWithdrawn,
    Merged,
    ReviewRequestedAgain,
    Superseded,
    PrClosed,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::RequestWithdrawn => "review request withdrawn",
            CloseReason::Merged => "merged",
            CloseReason::ReviewRequestedAgain => "review requested again",
            CloseReason::Superseded => "newer review",
            CloseReason::PrClosed => "pull request closed",
        }
    }
}

/// Log a failed close. The entry stays tracked and the close is retried.
///
/// A 404 means the task was deleted in the task store, so every retry will
/// fail the same way until the entry is removed from the state file.
pub fn log_close_failure(url: &str, task_id: &TaskId, reason: CloseReason, err: &RemoteError) {
    if err.is_not_found() {
        error!(
            url,
            task_id = %task_id,
            reason = reason.as_str(),
            "task no longer exists in the task store; remove the entry from the state file to stop retrying"
        );
    } else {
        warn!(url, task_id = %task_id, reason = reason.as_str(), error = %err, "task close failed; keeping entry");
    }
}

/// Per-run state shared by both policies. Dropped when the run ends.
pub struct RunContext<'a, H: ReviewHost> {
    host: &'a H,
    templates: TaskTemplates,
    defaults: &'a TaskDefaults,
    details: HashMap<(String, u64), Result<PrDetail, RemoteError>>,
    viewer: Option<Option<String>>,
}

impl<'a, H: ReviewHost> RunContext<'a, H> {
    pub fn new(host: &'a H, defaults: &'a TaskDefaults) -> Result<Self> {
        Ok(Self {
            host,
            templates: TaskTemplates::new()?,
            defaults,
            details: HashMap::new(),
            viewer: None,
        })
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn templates(&self) -> &TaskTemplates {
        &self.templates
    }

    /// PR detail, fetched at most once per run. Failures are memoized too.
    pub fn pr_detail(&mut self, pr: &RemotePr) -> Result<PrDetail, RemoteError> {
        let host = self.host;
        self.details
            .entry((pr.repo.clone(), pr.number))
            .or_insert_with(|| host.pr_detail(&pr.repo, pr.number))
            .clone()
    }

    /// Viewer login, fetched at most once per run. `None` if unavailable.
    pub fn viewer_login(&mut self) -> Option<String> {
        if self.viewer.is_none() {
            let login = match self.host.viewer_login() {
                Ok(login) => {
                    debug!(login = %login, "resolved viewer login");
                    Some(login)
                }
                Err(err) => {
                    warn!(error = %err, "cannot resolve viewer login");
                    None
                }
            };
            self.viewer = Some(login);
        }
        self.viewer.clone().flatten()
    }

    pub fn new_task(&self, text: TaskText, priority: Priority) -> NewTask {
        NewTask {
            content: text.content,
            description: text.description,
            priority,
            project_id: self.defaults.project_id.clone(),
            section_id: self.defaults.section_id.clone(),
            due_string: self.defaults.due_string.clone(),
        }
    }
}

/// Run one reconciliation pass.
///
/// Only template setup can fail; remote and state-file failures are logged and
/// reflected in the returned [`SyncOutcome`].
pub fn run_sync<H: ReviewHost, T: TaskStore, S: StateStore>(
    host: &H,
    tasks: &T,
    store: &S,
    options: &SyncOptions,
) -> Result<SyncOutcome> {
    let mut doc = store.load();
    let mut ctx = RunContext::new(host, &options.task_defaults)?;
    let mut outcome = SyncOutcome::default();

    if options.policies.includes(Policy::ReviewRequest) {
        let report = reconcile_review_requests(&mut ctx, tasks, &mut doc.review_requests);
        log_report(Policy::ReviewRequest, &report);
        outcome.review_requests = Some(report);
    }
    if options.policies.includes(Policy::ReviewReceived) {
        let report = reconcile_reviews_received(&mut ctx, tasks, &mut doc.reviews_received);
        log_report(Policy::ReviewReceived, &report);
        outcome.reviews_received = Some(report);
    }
    drop(ctx);

    if options.persist_state {
        match store.save(&doc) {
            Ok(()) => outcome.state_saved = true,
            Err(err) => error!(error = %format!("{err:#}"), "failed to save state"),
        }
    } else {
        debug!("state persistence disabled for this run");
    }
    Ok(outcome)
}

fn log_report(policy: Policy, report: &PolicyReport) {
    if report.aborted {
        return;
    }
    info!(
        %policy,
        created = report.created,
        closed = report.closed,
        failures = report.failures,
        "policy reconciled"
    );
}
