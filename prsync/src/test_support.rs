//! Test-only fakes and builders for reconciliation runs.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::core::state::StateDocument;
use crate::core::types::{NewTask, PrDetail, RemotePr, Review, ReviewState, TaskId};
use crate::io::github::ReviewHost;
use crate::io::http::RemoteError;
use crate::io::state_store::{JsonStateStore, StateStore};
use crate::io::todoist::TaskStore;

/// Deterministic PR in `repo` with author `alice`.
pub fn pr(repo: &str, number: u64) -> RemotePr {
    RemotePr {
        url: format!("https://github.com/{repo}/pull/{number}"),
        number,
        title: format!("{repo} change {number}"),
        author: "alice".to_string(),
        repo: repo.to_string(),
    }
}

/// Review by `bob`.
pub fn review(id: u64, state: ReviewState) -> Review {
    Review {
        id,
        author: "bob".to_string(),
        state,
    }
}

/// Open, unmerged PR detail asking `login` directly.
pub fn direct_detail(login: &str) -> PrDetail {
    PrDetail {
        merged: false,
        requested_reviewers: vec![login.to_string()],
        requested_teams: Vec::new(),
    }
}

fn scripted_failure(endpoint: &str) -> RemoteError {
    RemoteError::Status {
        endpoint: endpoint.to_string(),
        status: 502,
    }
}

/// Calls observed by [`ScriptedReviewHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Search(String),
    Detail { repo: String, number: u64 },
    Reviews { repo: String, number: u64 },
    Viewer,
}

/// Review host backed by canned responses.
///
/// Unset searches and details fail; unset reviews are empty.
#[derive(Debug, Default)]
pub struct ScriptedReviewHost {
    viewer: Option<String>,
    searches: HashMap<String, Vec<RemotePr>>,
    details: HashMap<(String, u64), PrDetail>,
    reviews: HashMap<(String, u64), Vec<Review>>,
    failing_reviews: HashSet<(String, u64)>,
    calls: RefCell<Vec<HostCall>>,
}

impl ScriptedReviewHost {
    pub fn new(viewer: &str) -> Self {
        Self {
            viewer: Some(viewer.to_string()),
            ..Self::default()
        }
    }

    pub fn set_search(&mut self, query: &str, prs: Vec<RemotePr>) {
        self.searches.insert(query.to_string(), prs);
    }

    pub fn fail_search(&mut self, query: &str) {
        self.searches.remove(query);
    }

    pub fn set_detail(&mut self, pr: &RemotePr, detail: PrDetail) {
        self.details.insert((pr.repo.clone(), pr.number), detail);
    }

    pub fn fail_detail(&mut self, pr: &RemotePr) {
        self.details.remove(&(pr.repo.clone(), pr.number));
    }

    pub fn set_reviews(&mut self, pr: &RemotePr, reviews: Vec<Review>) {
        let key = (pr.repo.clone(), pr.number);
        self.failing_reviews.remove(&key);
        self.reviews.insert(key, reviews);
    }

    pub fn fail_reviews(&mut self, pr: &RemotePr) {
        self.failing_reviews.insert((pr.repo.clone(), pr.number));
    }

    pub fn fail_viewer(&mut self) {
        self.viewer = None;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }
}

impl ReviewHost for ScriptedReviewHost {
    fn search_open_prs(&self, query: &str) -> Result<Vec<RemotePr>, RemoteError> {
        self.calls
            .borrow_mut()
            .push(HostCall::Search(query.to_string()));
        self.searches
            .get(query)
            .cloned()
            .ok_or_else(|| scripted_failure("/search/issues"))
    }

    fn pr_detail(&self, repo: &str, number: u64) -> Result<PrDetail, RemoteError> {
        self.calls.borrow_mut().push(HostCall::Detail {
            repo: repo.to_string(),
            number,
        });
        self.details
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| scripted_failure("/pulls"))
    }

    fn reviews(&self, repo: &str, number: u64) -> Result<Vec<Review>, RemoteError> {
        self.calls.borrow_mut().push(HostCall::Reviews {
            repo: repo.to_string(),
            number,
        });
        let key = (repo.to_string(), number);
        if self.failing_reviews.contains(&key) {
            return Err(scripted_failure("/reviews"));
        }
        Ok(self.reviews.get(&key).cloned().unwrap_or_default())
    }

    fn viewer_login(&self) -> Result<String, RemoteError> {
        self.calls.borrow_mut().push(HostCall::Viewer);
        self.viewer.clone().ok_or_else(|| scripted_failure("/user"))
    }
}

/// Task store that records calls and hands out sequential ids.
#[derive(Debug, Default)]
pub struct RecordingTaskStore {
    next_id: Cell<u32>,
    created: RefCell<Vec<(TaskId, NewTask)>>,
    closed: RefCell<Vec<TaskId>>,
    fail_creates: Cell<bool>,
    fail_closes: Cell<bool>,
    deleted: RefCell<HashSet<TaskId>>,
}

impl RecordingTaskStore {
    pub fn created(&self) -> Vec<(TaskId, NewTask)> {
        self.created.borrow().clone()
    }

    pub fn closed(&self) -> Vec<TaskId> {
        self.closed.borrow().clone()
    }

    /// Total successful create and close calls.
    pub fn mutation_count(&self) -> usize {
        self.created.borrow().len() + self.closed.borrow().len()
    }

    pub fn clear(&self) {
        self.created.borrow_mut().clear();
        self.closed.borrow_mut().clear();
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.set(fail);
    }

    pub fn fail_closes(&self, fail: bool) {
        self.fail_closes.set(fail);
    }

    /// Simulate a task deleted by hand: closing it answers 404.
    pub fn delete_task(&self, id: &TaskId) {
        self.deleted.borrow_mut().insert(id.clone());
    }
}

impl TaskStore for RecordingTaskStore {
    fn create_task(&self, task: &NewTask) -> Result<TaskId, RemoteError> {
        if self.fail_creates.get() {
            return Err(scripted_failure("/tasks"));
        }
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let id = TaskId::new(format!("task-{n}"));
        self.created.borrow_mut().push((id.clone(), task.clone()));
        Ok(id)
    }

    fn close_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        if self.fail_closes.get() {
            return Err(scripted_failure("/tasks/close"));
        }
        if self.deleted.borrow().contains(id) {
            return Err(RemoteError::Status {
                endpoint: format!("/tasks/{id}/close"),
                status: 404,
            });
        }
        self.closed.borrow_mut().push(id.clone());
        Ok(())
    }
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    doc: RefCell<StateDocument>,
    saves: Cell<usize>,
    fail_saves: Cell<bool>,
}

impl MemoryStateStore {
    pub fn with_document(doc: StateDocument) -> Self {
        Self {
            doc: RefCell::new(doc),
            ..Self::default()
        }
    }

    pub fn document(&self) -> StateDocument {
        self.doc.borrow().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> StateDocument {
        self.doc.borrow().clone()
    }

    fn save(&self, doc: &StateDocument) -> Result<()> {
        if self.fail_saves.get() {
            return Err(anyhow!("scripted save failure"));
        }
        *self.doc.borrow_mut() = doc.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// JSON state store inside a fresh temp directory. Keep the guard alive.
pub fn temp_state_store() -> Result<(tempfile::TempDir, JsonStateStore)> {
    let dir = tempfile::tempdir()?;
    let store = JsonStateStore::new(dir.path().join("state.json"));
    Ok((dir, store))
}

/// Run `f` under a subscriber that captures formatted log output.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || LogSink(Arc::clone(&sink)))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.lock().map(|b| b.clone()).unwrap_or_default();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}

struct LogSink(Arc<Mutex<Vec<u8>>>);

impl Write for LogSink {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
