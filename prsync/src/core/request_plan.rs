//! Pure decisions for the review-request policy.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::{PrDetail, RemotePr, TaskId};

/// Snapshot split into PRs already tracked and PRs seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestPartition<'a> {
    /// URLs of snapshot PRs that already have a task. Trusted without re-checking.
    pub tracked: BTreeSet<String>,
    /// Snapshot PRs with no entry yet, in snapshot order.
    pub new: Vec<&'a RemotePr>,
}

pub fn partition_snapshot<'a>(
    snapshot: &'a [RemotePr],
    tracked: &BTreeMap<String, TaskId>,
) -> RequestPartition<'a> {
    let mut partition = RequestPartition::default();
    let mut seen = BTreeSet::new();
    for pr in snapshot {
        if !seen.insert(pr.url.as_str()) {
            continue;
        }
        if tracked.contains_key(&pr.url) {
            partition.tracked.insert(pr.url.clone());
        } else {
            partition.new.push(pr);
        }
    }
    partition
}

/// Outcome of checking whether a new PR asks the viewer directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Viewer appears in the individual reviewer list.
    Direct,
    /// Request reaches the viewer only through a team (or has been withdrawn).
    NotDirect,
    /// Detail or viewer login was unavailable; the PR is included anyway.
    Unverified,
}

impl Confirmation {
    pub fn includes(self) -> bool {
        !matches!(self, Confirmation::NotDirect)
    }
}

/// Classify a new PR. Missing data fails open.
pub fn confirm_direct(detail: Option<&PrDetail>, viewer: Option<&str>) -> Confirmation {
    match (detail, viewer) {
        (Some(detail), Some(viewer)) if detail.requests_directly(viewer) => Confirmation::Direct,
        (Some(_), Some(_)) => Confirmation::NotDirect,
        _ => Confirmation::Unverified,
    }
}

/// Entries whose PR is no longer in `valid`, in key order.
pub fn stale_entries(
    tracked: &BTreeMap<String, TaskId>,
    valid: &BTreeSet<String>,
) -> Vec<(String, TaskId)> {
    tracked
        .iter()
        .filter(|(url, _)| !valid.contains(*url))
        .map(|(url, task)| (url.clone(), task.clone()))
        .collect()
}
