//! Task-facing handlers: create, voice, project-scoped create, progress.

use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, RequestCtx};

/// POST /task — queue a prompt for the desktop session.
pub fn create(ctx: &ApiContext, req: &RequestCtx) -> Result<Value, ApiError> {
    let prompt = require_prompt(req, "prompt")?;
    let project = req.param("project");
    let task = lock_tasks(ctx)?.queue(prompt, project, None);
    tracing::info!(task_id = %task.task_id, "task queued");
    Ok(json!({ "task_id": task.task_id, "status": task.status }))
}

/// POST /voice — same as /task but the text came from speech capture.
/// Accepts `text` (preferred) or `prompt`.
pub fn voice(ctx: &ApiContext, req: &RequestCtx) -> Result<Value, ApiError> {
    let text = match req.param("text") {
        Some(t) if !t.trim().is_empty() => t,
        _ => require_prompt(req, "prompt")?,
    };
    let project = req.param("project");
    let task = lock_tasks(ctx)?.queue(text, project, Some("voice".to_string()));
    tracing::info!(task_id = %task.task_id, "voice task queued");
    Ok(json!({ "task_id": task.task_id, "status": task.status }))
}

/// POST /project/task — queue a prompt against a known project. Unknown
/// project names are rejected rather than silently accepted.
pub fn project_task(ctx: &ApiContext, req: &RequestCtx) -> Result<Value, ApiError> {
    let prompt = require_prompt(req, "prompt")?;
    let project = req
        .param("project")
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing project".to_string()))?;
    if ctx.registry.get(&project).is_none() {
        return Err(ApiError::NotFound);
    }
    let task = lock_tasks(ctx)?.queue(prompt, Some(project.clone()), None);
    tracing::info!(task_id = %task.task_id, project = %project, "project task queued");
    Ok(json!({ "task_id": task.task_id, "status": task.status, "project": project }))
}

/// GET /progress — every task recorded this session.
pub fn progress(ctx: &ApiContext, _req: &RequestCtx) -> Result<Value, ApiError> {
    let tasks = lock_tasks(ctx)?;
    Ok(json!({
        "tasks": tasks.snapshot(),
        "count": tasks.len(),
    }))
}

fn require_prompt(req: &RequestCtx, key: &str) -> Result<String, ApiError> {
    req.param(key)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {key}")))
}

fn lock_tasks<'a>(
    ctx: &'a ApiContext,
) -> Result<std::sync::MutexGuard<'a, crate::tasks::TaskList>, ApiError> {
    ctx.tasks
        .lock()
        .map_err(|_| ApiError::Internal("task list lock poisoned".to_string()))
}
