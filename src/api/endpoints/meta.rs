//! Server metadata handlers: status, sessions, connect-info.

use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, RequestCtx};
use crate::config;

/// GET /status — quick health and queue summary.
pub fn status(ctx: &ApiContext, _req: &RequestCtx) -> Result<Value, ApiError> {
    let tasks = ctx
        .tasks
        .lock()
        .map_err(|_| ApiError::Internal("task list lock poisoned".to_string()))?;
    Ok(json!({
        "version": config::APP_VERSION,
        "tasks_total": tasks.len(),
        "tasks_queued": tasks.queued_count(),
        "auth_required": ctx.auth_required,
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
    }))
}

/// GET /sessions — active sessions across known projects.
pub fn sessions(ctx: &ApiContext, _req: &RequestCtx) -> Result<Value, ApiError> {
    let sessions: Vec<Value> = ctx
        .registry
        .sessions()
        .into_iter()
        .map(|(project, session)| {
            json!({
                "project": project,
                "session_id": session.id,
                "started_at": session.started_at,
            })
        })
        .collect();
    Ok(json!({ "count": sessions.len(), "sessions": sessions }))
}

/// GET /connect-info — how to reach this server, including the TLS
/// certificate fingerprint a client should pin.
pub fn connect_info(ctx: &ApiContext, _req: &RequestCtx) -> Result<Value, ApiError> {
    let info = &ctx.connect;
    Ok(json!({
        "host": info.host,
        "port": info.port,
        "tls": info.tls,
        "fingerprint": info.fingerprint,
        "url": info.url(),
    }))
}
