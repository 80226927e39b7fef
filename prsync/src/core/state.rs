//! Persisted tracking document shared by both policies.
//!
//! The document maps each policy to its tracked PRs, keyed by PR URL. An entry
//! exists while an open task may exist for that PR.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::TaskId;

/// Tracking record for an authored PR under the review-received policy.
///
/// `task_id == None` means "tracked, no open task": the previous task was
/// closed and no replacement has been created yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceivedEntry {
    pub task_id: Option<TaskId>,
    /// Id of the newest review a task was created for.
    pub last_review_id: Option<u64>,
}

/// Whole-run state document. Unknown top-level keys survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    /// PR URL -> task id for PRs awaiting the viewer's review.
    pub review_requests: BTreeMap<String, TaskId>,
    /// PR URL -> tracking record for PRs the viewer authored.
    pub reviews_received: BTreeMap<String, ReceivedEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StateDocument {
    /// Number of tracked entries holding an open task, across both policies.
    pub fn open_task_count(&self) -> usize {
        self.review_requests.len()
            + self
                .reviews_received
                .values()
                .filter(|entry| entry.task_id.is_some())
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.review_requests.is_empty() && self.reviews_received.is_empty()
    }
}
