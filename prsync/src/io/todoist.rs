//! Task store adapter (Todoist REST v2).
//!
//! No business logic lives here: tasks are created and closed as asked.

use std::cell::Cell;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::types::{NewTask, TaskId};
use crate::io::http::{HttpClient, RemoteError};

pub const DEFAULT_API_BASE: &str = "https://api.todoist.com/rest/v2";

/// Effectful boundary for task creation and completion.
pub trait TaskStore {
    fn create_task(&self, task: &NewTask) -> Result<TaskId, RemoteError>;
    /// Close a task. Any 2xx (including 204 No Content) counts as success.
    fn close_task(&self, id: &TaskId) -> Result<(), RemoteError>;
}

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    content: &'a str,
    description: &'a str,
    priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    section_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_string: Option<&'a str>,
}

impl<'a> From<&'a NewTask> for CreateTaskBody<'a> {
    fn from(task: &'a NewTask) -> Self {
        Self {
            content: &task.content,
            description: &task.description,
            priority: task.priority.level(),
            project_id: task.project_id.as_deref(),
            section_id: task.section_id.as_deref(),
            due_string: task.due_string.as_deref(),
        }
    }
}

pub struct TodoistClient {
    http: HttpClient,
    api_base: String,
    authorization: String,
}

impl TodoistClient {
    pub fn new(http: HttpClient, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bearer {}", token.trim()),
        }
    }
}

impl TaskStore for TodoistClient {
    fn create_task(&self, task: &NewTask) -> Result<TaskId, RemoteError> {
        let url = format!("{}/tasks", self.api_base);
        let headers = [("Authorization", self.authorization.as_str())];
        let response: Value = self
            .http
            .post_json(&url, &headers, &CreateTaskBody::from(task))?;
        let id = task_id_from_response(&response).ok_or_else(|| RemoteError::Decode {
            endpoint: url.clone(),
            message: "response has no task id".to_string(),
        })?;
        debug!(task_id = %id, "task created");
        Ok(id)
    }

    fn close_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let url = format!("{}/tasks/{}/close", self.api_base, id);
        let headers = [("Authorization", self.authorization.as_str())];
        let status = self.http.post_empty(&url, &headers)?;
        debug!(task_id = %id, status, "task closed");
        Ok(())
    }
}

/// Task ids arrive as strings, older payloads used numbers.
fn task_id_from_response(response: &Value) -> Option<TaskId> {
    match response.get("id")? {
        Value::String(id) if !id.is_empty() => Some(TaskId::new(id.as_str())),
        Value::Number(id) => Some(TaskId::new(id.to_string())),
        _ => None,
    }
}

/// Task store that only logs. Hands out local ids so a run can proceed.
#[derive(Debug, Default)]
pub struct DryRunTaskStore {
    next_id: Cell<u32>,
}

impl TaskStore for DryRunTaskStore {
    fn create_task(&self, task: &NewTask) -> Result<TaskId, RemoteError> {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let id = TaskId::new(format!("dry-run-{n}"));
        info!(task_id = %id, content = %task.content, priority = task.priority.level(), "dry run: would create task");
        Ok(id)
    }

    fn close_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        info!(task_id = %id, "dry run: would close task");
        Ok(())
    }
}
