//! Project-facing handlers backed by the on-disk registry.

use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, RequestCtx};

/// GET /projects — names of every registered project.
pub fn list(ctx: &ApiContext, _req: &RequestCtx) -> Result<Value, ApiError> {
    let projects = ctx.registry.projects();
    let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
    Ok(json!({ "count": names.len(), "projects": names }))
}

/// GET /project/status?project=NAME — one project's registry record.
pub fn status(ctx: &ApiContext, req: &RequestCtx) -> Result<Value, ApiError> {
    let name = req
        .param("project")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing project".to_string()))?;
    let record = ctx.registry.get(&name).ok_or(ApiError::NotFound)?;
    Ok(json!({ "project": record }))
}
