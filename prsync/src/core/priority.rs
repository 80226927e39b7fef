//! Priority selection for created tasks.

use crate::core::types::{Policy, Priority, ReviewKind};

/// `(policy, kind, priority)`. `kind == None` matches any review kind.
const PRIORITY_TABLE: &[(Policy, Option<ReviewKind>, Priority)] = &[
    (Policy::ReviewRequest, None, Priority::HIGH),
    (
        Policy::ReviewReceived,
        Some(ReviewKind::Review),
        Priority::URGENT,
    ),
    (
        Policy::ReviewReceived,
        Some(ReviewKind::Approval),
        Priority::MEDIUM,
    ),
];

/// Look up the task priority for a policy and (optional) review kind.
///
/// Rows are matched top to bottom; unmatched combinations fall back to
/// [`Priority::LOW`].
pub fn priority_for(policy: Policy, kind: Option<ReviewKind>) -> Priority {
    PRIORITY_TABLE
        .iter()
        .find(|(row_policy, row_kind, _)| {
            *row_policy == policy && (row_kind.is_none() || *row_kind == kind)
        })
        .map(|(_, _, priority)| *priority)
        .unwrap_or(Priority::LOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_policy_and_kind_maps_to_expected_priority() {
        let cases = [
            (Policy::ReviewRequest, None, 3),
            (Policy::ReviewRequest, Some(ReviewKind::Review), 3),
            (Policy::ReviewRequest, Some(ReviewKind::Approval), 3),
            (Policy::ReviewReceived, Some(ReviewKind::Review), 4),
            (Policy::ReviewReceived, Some(ReviewKind::Approval), 2),
            (Policy::ReviewReceived, None, 1),
        ];
        for (policy, kind, expected) in cases {
            assert_eq!(
                priority_for(policy, kind).level(),
                expected,
                "{policy} {kind:?}"
            );
        }
    }
}
