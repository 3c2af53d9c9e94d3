//! In-memory task queue fed by the remote API.
//!
//! Tasks are handed off to the local automation session out of band; this
//! subsystem only records them. The list is never persisted and grows
//! unboundedly within one process lifetime, which is acceptable for a
//! single long-lived session.

use serde::Serialize;

/// Status every freshly created task carries.
pub const STATUS_QUEUED: &str = "queued";

/// One command issued through the remote API.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub task_id: String,
    pub prompt: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Generate a task id: 12 lowercase hex chars.
pub fn new_task_id() -> String {
    let bytes: [u8; 6] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Purely additive task list. Owned by the single dispatch worker.
#[derive(Debug, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    /// Append a new queued task and return a copy of it.
    pub fn queue(
        &mut self,
        prompt: String,
        project: Option<String>,
        source: Option<String>,
    ) -> Task {
        let task = Task {
            task_id: new_task_id(),
            prompt,
            status: STATUS_QUEUED.to_string(),
            project,
            source,
            created_at: chrono::Utc::now(),
        };
        self.tasks.push(task.clone());
        task
    }

    pub fn snapshot(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn queued_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == STATUS_QUEUED).count()
    }
}
