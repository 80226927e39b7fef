//! End-to-end reconciliation scenarios.
//!
//! Drives `run_sync` across several runs with a scripted review host, a
//! recording task store, and a real JSON state file in a temp directory.

use prsync::core::state::{ReceivedEntry, StateDocument};
use prsync::core::types::{PrDetail, Priority, ReviewState, TaskId};
use prsync::io::github::{AUTHORED_QUERY, REVIEW_REQUESTED_QUERY};
use prsync::io::state_store::StateStore;
use prsync::sync::{SyncOptions, run_sync};
use prsync::test_support::{
    MemoryStateStore, RecordingTaskStore, ScriptedReviewHost, direct_detail, pr, review,
    temp_state_store,
};

fn options() -> SyncOptions {
    SyncOptions {
        persist_state: true,
        ..SyncOptions::default()
    }
}

/// Host with one direct review request and one reviewed authored PR.
fn busy_host() -> ScriptedReviewHost {
    let requested = pr("acme/api", 1);
    let authored = pr("acme/web", 2);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, vec![requested.clone()]);
    host.set_search(AUTHORED_QUERY, vec![authored.clone()]);
    host.set_detail(&requested, direct_detail("me"));
    host.set_detail(&authored, PrDetail::default());
    host.set_reviews(&authored, vec![review(10, ReviewState::Commented)]);
    host
}

#[test]
fn second_run_with_unchanged_snapshot_issues_no_task_calls() {
    let host = busy_host();
    let tasks = RecordingTaskStore::default();
    let (_dir, store) = temp_state_store().expect("state store");

    run_sync(&host, &tasks, &store, &options()).expect("first run");
    assert_eq!(tasks.mutation_count(), 2);

    tasks.clear();
    run_sync(&host, &tasks, &store, &options()).expect("second run");
    assert_eq!(tasks.mutation_count(), 0);
}

#[test]
fn snapshot_failure_never_closes_tracked_tasks() {
    let mut host = busy_host();
    let tasks = RecordingTaskStore::default();
    let (_dir, store) = temp_state_store().expect("state store");
    run_sync(&host, &tasks, &store, &options()).expect("seed run");
    let before = store.load();

    host.fail_search(REVIEW_REQUESTED_QUERY);
    host.fail_search(AUTHORED_QUERY);
    tasks.clear();
    let outcome = run_sync(&host, &tasks, &store, &options()).expect("failing run");

    assert!(outcome.review_requests.expect("requests report").aborted);
    assert!(outcome.reviews_received.expect("received report").aborted);
    assert!(tasks.closed().is_empty());
    assert_eq!(store.load(), before);
}

#[test]
fn new_request_with_failed_detail_is_tracked() {
    let unknown = pr("acme/api", 9);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, vec![unknown.clone()]);
    host.set_search(AUTHORED_QUERY, Vec::new());
    host.fail_detail(&unknown);
    let store = MemoryStateStore::default();

    run_sync(&host, &RecordingTaskStore::default(), &store, &options()).expect("sync");

    assert!(store.document().review_requests.contains_key(&unknown.url));
}

#[test]
fn scenario_a_withdrawn_request_closes_task() {
    let x = pr("acme/api", 11);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, vec![x.clone()]);
    host.set_search(AUTHORED_QUERY, Vec::new());
    host.set_detail(&x, direct_detail("me"));
    let tasks = RecordingTaskStore::default();
    let store = MemoryStateStore::default();

    run_sync(&host, &tasks, &store, &options()).expect("first run");
    let task_id = store.document().review_requests[&x.url].clone();

    // Request withdrawn: X has no requested reviewers and leaves the search.
    host.set_detail(&x, PrDetail::default());
    host.set_search(REVIEW_REQUESTED_QUERY, Vec::new());
    run_sync(&host, &tasks, &store, &options()).expect("second run");

    assert_eq!(tasks.closed(), vec![task_id]);
    assert!(store.document().review_requests.is_empty());
}

#[test]
fn scenario_b_newer_review_replaces_task() {
    let y = pr("acme/web", 12);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, Vec::new());
    host.set_search(AUTHORED_QUERY, vec![y.clone()]);
    host.set_detail(&y, PrDetail::default());
    host.set_reviews(&y, vec![review(100, ReviewState::Approved)]);
    let tasks = RecordingTaskStore::default();
    let store = MemoryStateStore::default();

    run_sync(&host, &tasks, &store, &options()).expect("first run");
    let first_task = tasks.created()[0].0.clone();
    assert_eq!(tasks.created()[0].1.priority, Priority::MEDIUM);

    host.set_reviews(
        &y,
        vec![
            review(100, ReviewState::Approved),
            review(101, ReviewState::ChangesRequested),
        ],
    );
    run_sync(&host, &tasks, &store, &options()).expect("second run");

    assert_eq!(tasks.closed(), vec![first_task]);
    let created = tasks.created();
    assert_eq!(created.len(), 2);
    let (second_task, second) = &created[1];
    assert_eq!(second.priority, Priority::URGENT);
    assert!(second.content.starts_with("Address review on"));

    let entry = &store.document().reviews_received[&y.url];
    assert_eq!(entry.last_review_id, Some(101));
    assert_eq!(entry.task_id.as_ref(), Some(second_task));
}

#[test]
fn scenario_c_merge_closes_task_then_entry_is_dropped() {
    let z = pr("acme/web", 13);
    let mut doc = StateDocument::default();
    doc.reviews_received.insert(
        z.url.clone(),
        ReceivedEntry {
            task_id: Some(TaskId::new("t-z")),
            last_review_id: Some(7),
        },
    );
    let store = MemoryStateStore::with_document(doc);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, Vec::new());
    host.set_search(AUTHORED_QUERY, vec![z.clone()]);
    host.set_detail(
        &z,
        PrDetail {
            merged: true,
            ..PrDetail::default()
        },
    );
    let tasks = RecordingTaskStore::default();

    run_sync(&host, &tasks, &store, &options()).expect("merge run");
    assert_eq!(tasks.closed(), vec![TaskId::new("t-z")]);
    assert_eq!(store.document().reviews_received[&z.url].task_id, None);

    host.set_search(AUTHORED_QUERY, Vec::new());
    tasks.clear();
    run_sync(&host, &tasks, &store, &options()).expect("follow-up run");
    assert!(tasks.closed().is_empty());
    assert!(store.document().reviews_received.is_empty());
}

#[test]
fn scenario_d_empty_state_file_on_first_run() {
    let (_dir, store) = temp_state_store().expect("state store");
    std::fs::write(store.path(), "").expect("write empty state");
    let host = busy_host();
    let tasks = RecordingTaskStore::default();

    let outcome = run_sync(&host, &tasks, &store, &options()).expect("sync");

    assert!(outcome.state_saved);
    assert_eq!(tasks.created().len(), 2);
    let doc = store.load();
    assert_eq!(doc.review_requests.len(), 1);
    assert_eq!(doc.reviews_received.len(), 1);
}

#[test]
fn at_most_one_open_task_per_authored_pr() {
    let y = pr("acme/web", 14);
    let mut host = ScriptedReviewHost::new("me");
    host.set_search(REVIEW_REQUESTED_QUERY, Vec::new());
    host.set_search(AUTHORED_QUERY, vec![y.clone()]);
    host.set_detail(&y, PrDetail::default());
    let tasks = RecordingTaskStore::default();
    let store = MemoryStateStore::default();

    let mut reviews = Vec::new();
    for id in 1..=4 {
        reviews.push(review(id, ReviewState::Commented));
        host.set_reviews(&y, reviews.clone());
        run_sync(&host, &tasks, &store, &options()).expect("sync");
        let open = tasks.created().len() - tasks.closed().len();
        assert_eq!(open, 1, "after review {id}");
    }
    assert_eq!(store.document().reviews_received[&y.url].last_review_id, Some(4));
}
