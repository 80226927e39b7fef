//! Pure decisions for the review-received policy.
//!
//! Per authored PR the policy first inspects detail (merge, re-request), then
//! the latest review. Both steps are modelled as verdicts so the orchestration
//! only has to execute them.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::state::ReceivedEntry;
use crate::core::types::{PrDetail, Review};

/// Verdict from PR detail alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailVerdict {
    /// Close any open task with reason "merged".
    Merged,
    /// Close any open task with reason "review requested again" and stop.
    ReviewRequestedAgain,
    /// Look at the reviews next.
    InspectReviews,
}

pub fn assess_detail(detail: &PrDetail) -> DetailVerdict {
    if detail.merged {
        DetailVerdict::Merged
    } else if detail.has_pending_requests() {
        DetailVerdict::ReviewRequestedAgain
    } else {
        DetailVerdict::InspectReviews
    }
}

/// Verdict from the review list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict<'a> {
    /// No reviews yet; nothing to mirror.
    NoReviews,
    /// Latest review already has (or had) a task.
    Unchanged,
    /// Latest review differs from the last one seen: replace the task.
    Replace(&'a Review),
}

/// Compare the newest review against the entry's last-seen review id.
///
/// Reviews arrive oldest first, so the last element is authoritative.
pub fn assess_reviews<'a>(entry: Option<&ReceivedEntry>, reviews: &'a [Review]) -> ReviewVerdict<'a> {
    let Some(latest) = reviews.last() else {
        return ReviewVerdict::NoReviews;
    };
    match entry.and_then(|e| e.last_review_id) {
        Some(seen) if seen == latest.id => ReviewVerdict::Unchanged,
        _ => ReviewVerdict::Replace(latest),
    }
}

/// Entries whose PR dropped out of the open snapshot, in key order.
pub fn departed_entries(
    tracked: &BTreeMap<String, ReceivedEntry>,
    open_urls: &BTreeSet<String>,
) -> Vec<String> {
    tracked
        .keys()
        .filter(|url| !open_urls.contains(*url))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ReviewState, TaskId};
    use crate::test_support::review;

    #[test]
    fn merged_wins_over_pending_requests() {
        let detail = PrDetail {
            merged: true,
            requested_reviewers: vec!["bob".to_string()],
            requested_teams: Vec::new(),
        };
        assert_eq!(assess_detail(&detail), DetailVerdict::Merged);
    }

    #[test]
    fn team_request_counts_as_requested_again() {
        let detail = PrDetail {
            merged: false,
            requested_reviewers: Vec::new(),
            requested_teams: vec!["core".to_string()],
        };
        assert_eq!(assess_detail(&detail), DetailVerdict::ReviewRequestedAgain);
        assert_eq!(
            assess_detail(&PrDetail::default()),
            DetailVerdict::InspectReviews
        );
    }

    #[test]
    fn latest_review_drives_replacement() {
        let reviews = vec![
            review(100, ReviewState::Approved),
            review(101, ReviewState::ChangesRequested),
        ];
        let entry = ReceivedEntry {
            task_id: Some(TaskId::new("t1")),
            last_review_id: Some(100),
        };
        assert_eq!(
            assess_reviews(Some(&entry), &reviews),
            ReviewVerdict::Replace(&reviews[1])
        );

        let caught_up = ReceivedEntry {
            last_review_id: Some(101),
            ..entry
        };
        assert_eq!(
            assess_reviews(Some(&caught_up), &reviews),
            ReviewVerdict::Unchanged
        );
    }

    #[test]
    fn first_observation_replaces_and_empty_list_waits() {
        let reviews = vec![review(7, ReviewState::Commented)];
        assert_eq!(
            assess_reviews(None, &reviews),
            ReviewVerdict::Replace(&reviews[0])
        );
        assert_eq!(assess_reviews(None, &[]), ReviewVerdict::NoReviews);
    }

    #[test]
    fn departed_entries_excludes_open_prs() {
        let mut tracked = BTreeMap::new();
        tracked.insert("https://x/pull/1".to_string(), ReceivedEntry::default());
        tracked.insert("https://x/pull/2".to_string(), ReceivedEntry::default());
        let open = BTreeSet::from(["https://x/pull/1".to_string()]);
        assert_eq!(
            departed_entries(&tracked, &open),
            vec!["https://x/pull/2".to_string()]
        );
    }
}
