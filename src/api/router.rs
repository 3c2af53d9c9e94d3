//! Request dispatch.
//!
//! Routing is a fixed table keyed by (method, path) rather than a pattern
//! tree: the API surface is small and a flat table keeps dispatch fully
//! testable without a socket. Authentication runs before route lookup, so
//! a caller with a bad token learns nothing about which paths exist.

use std::collections::HashMap;
use std::net::IpAddr;

use serde_json::Value;

use crate::api::endpoints::assets::{self, StaticAsset};
use crate::api::endpoints::{meta, projects, tasks};
use crate::api::error::ApiError;
use crate::api::format;
use crate::api::types::{ApiContext, RequestCtx};

type HandlerFn = fn(&ApiContext, &RequestCtx) -> Result<Value, ApiError>;

enum Route {
    Api(HandlerFn),
    Asset(StaticAsset),
}

/// A fully dispatched response, ready for the transport layer.
#[derive(Debug)]
pub enum Dispatched {
    Json { status: u16, body: Value },
    Asset { content_type: &'static str, body: &'static str },
}

pub struct ApiRouter {
    ctx: ApiContext,
    routes: HashMap<(String, String), Route>,
}

impl ApiRouter {
    pub fn new(ctx: ApiContext) -> Self {
        let table: [(&str, &str, Route); 13] = [
            ("POST", "/task", Route::Api(tasks::create)),
            ("POST", "/voice", Route::Api(tasks::voice)),
            ("POST", "/project/task", Route::Api(tasks::project_task)),
            ("GET", "/progress", Route::Api(tasks::progress)),
            ("GET", "/status", Route::Api(meta::status)),
            ("GET", "/sessions", Route::Api(meta::sessions)),
            ("GET", "/connect-info", Route::Api(meta::connect_info)),
            ("GET", "/projects", Route::Api(projects::list)),
            ("GET", "/project/status", Route::Api(projects::status)),
            ("GET", "/", Route::Asset(assets::INDEX)),
            ("GET", "/manifest.json", Route::Asset(assets::MANIFEST)),
            ("GET", "/sw.js", Route::Asset(assets::SERVICE_WORKER)),
            ("GET", "/icon.svg", Route::Asset(assets::ICON)),
        ];
        let routes = table
            .into_iter()
            .map(|(method, path, route)| ((method.to_string(), path.to_string()), route))
            .collect();
        Self { ctx, routes }
    }

    pub fn context(&self) -> &ApiContext {
        &self.ctx
    }

    /// Resolve one request end to end: auth, route lookup, body decode,
    /// handler, response shaping.
    ///
    /// `raw_body` is the undecoded request body; `None` means the
    /// transport refused to read it (too large). Decoding happens after
    /// authentication so an unauthenticated caller sees the same
    /// `unauthorized` no matter what garbage they send.
    pub fn dispatch(
        &self,
        method: &str,
        path_and_query: &str,
        raw_body: Option<&[u8]>,
        bearer: Option<&str>,
        client_ip: IpAddr,
    ) -> Dispatched {
        let (path, query_str) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, q),
            None => (path_and_query, ""),
        };
        let path = normalize_path(path);

        if self.ctx.auth_required && !is_static_path(&path) {
            if let Err(err) = self.authenticate(bearer, client_ip) {
                return error_response(err);
            }
        }

        let route = match self.routes.get(&(method.to_string(), path.clone())) {
            Some(route) => route,
            None => return error_response(ApiError::NotFound),
        };

        match route {
            Route::Asset(asset) => Dispatched::Asset {
                content_type: asset.content_type,
                body: asset.body,
            },
            Route::Api(handler) => {
                let body = match parse_body(raw_body) {
                    Ok(body) => body,
                    Err(err) => return error_response(err),
                };
                let req = RequestCtx {
                    body,
                    query: parse_query(query_str),
                    client_ip,
                };
                match handler(&self.ctx, &req) {
                    Ok(value) => Dispatched::Json {
                        status: 200,
                        body: format::finalize(value),
                    },
                    Err(err) => error_response(err),
                }
            }
        }
    }

    /// Test convenience: dispatch a JSON value as the request body.
    #[cfg(test)]
    fn dispatch_value(
        &self,
        method: &str,
        path_and_query: &str,
        body: Value,
        bearer: Option<&str>,
        client_ip: IpAddr,
    ) -> Dispatched {
        let raw = body.to_string();
        self.dispatch(method, path_and_query, Some(raw.as_bytes()), bearer, client_ip)
    }

    fn authenticate(&self, bearer: Option<&str>, client_ip: IpAddr) -> Result<(), ApiError> {
        let token = bearer.ok_or(ApiError::Unauthorized)?;
        let mut store = self
            .ctx
            .tokens
            .lock()
            .map_err(|_| ApiError::Internal("token store lock poisoned".to_string()))?;
        if store.validate(token, client_ip) {
            Ok(())
        } else {
            tracing::warn!(%client_ip, "rejected api request");
            Err(ApiError::Unauthorized)
        }
    }
}

fn error_response(err: ApiError) -> Dispatched {
    Dispatched::Json {
        status: err.status(),
        body: format::finalize(err.envelope()),
    }
}

fn is_static_path(path: &str) -> bool {
    matches!(path, "/" | "/manifest.json" | "/sw.js" | "/icon.svg")
}

/// Collapse trailing slashes so `/status/` and `/status` hit the same
/// route. The root path stays as-is.
fn normalize_path(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

/// Decode the request body into a JSON object. An absent/empty body is an
/// empty object; an unreadable or malformed one is a client error.
fn parse_body(raw: Option<&[u8]>) -> Result<Value, ApiError> {
    let bytes = raw.ok_or_else(|| ApiError::BadRequest("body too large".to_string()))?;
    if bytes.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(bytes)
        .map_err(|_| ApiError::BadRequest("body is not valid json".to_string()))
}

fn parse_query(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
