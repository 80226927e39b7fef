//! Shared deterministic types for reconciliation logic.
//!
//! These types are the stable contract between the remote adapters and the
//! policies. They carry no I/O and describe one snapshot of remote state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An open pull request as returned by the search endpoint.
///
/// Identity is `url`; everything else is refreshed every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePr {
    /// Browser URL of the PR, used as the persisted key.
    pub url: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    /// Owning repository as `owner/name`.
    pub repo: String,
}

/// Per-PR detail used for merge and re-request detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrDetail {
    pub merged: bool,
    /// Logins of individually requested reviewers.
    pub requested_reviewers: Vec<String>,
    /// Slugs of requested teams.
    pub requested_teams: Vec<String>,
}

impl PrDetail {
    /// True when `login` is asked directly, not only through a team.
    pub fn requests_directly(&self, login: &str) -> bool {
        self.requested_reviewers
            .iter()
            .any(|reviewer| reviewer.eq_ignore_ascii_case(login))
    }

    /// True when any reviewer or team still has a pending request.
    pub fn has_pending_requests(&self) -> bool {
        !self.requested_reviewers.is_empty() || !self.requested_teams.is_empty()
    }
}

/// Review state as reported by the review host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

/// A submitted review. Ids increase in submission order within a PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: u64,
    pub author: String,
    pub state: ReviewState,
}

/// Coarse classification of a review for task wording and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewKind {
    Approval,
    Review,
}

impl ReviewKind {
    pub fn classify(state: &ReviewState) -> Self {
        match state {
            ReviewState::Approved => ReviewKind::Approval,
            _ => ReviewKind::Review,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewKind::Approval => "approval",
            ReviewKind::Review => "review",
        }
    }
}

/// The two reconciliation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// One task per PR the viewer is directly asked to review.
    ReviewRequest,
    /// One task per authored PR, reflecting its latest review.
    ReviewReceived,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::ReviewRequest => "review_requests",
            Policy::ReviewReceived => "reviews_received",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque task identifier assigned by the task store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task priority on the task store's 1..=4 scale (4 is most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const LOW: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(2);
    pub const HIGH: Priority = Priority(3);
    pub const URGENT: Priority = Priority(4);

    pub fn new(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Self(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

/// Everything needed to create one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub content: String,
    pub description: String,
    pub priority: Priority,
    pub project_id: Option<String>,
    pub section_id: Option<String>,
    pub due_string: Option<String>,
}
