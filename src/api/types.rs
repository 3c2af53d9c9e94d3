//! Shared state and request context threaded through the API handlers.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use crate::registry::ProjectRegistry;
use crate::tasks::TaskList;
use crate::tokens::TokenStore;

/// Where and how clients reach this server. Handed to /connect-info and
/// printed at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectInfo {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl ConnectInfo {
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Everything a handler may touch. Cloned per router instance; the locks
/// are shared.
#[derive(Clone)]
pub struct ApiContext {
    pub tokens: Arc<Mutex<TokenStore>>,
    pub tasks: Arc<Mutex<TaskList>>,
    pub registry: ProjectRegistry,
    pub connect: ConnectInfo,
    pub auth_required: bool,
    pub started_at: std::time::Instant,
}

/// One decoded request as the handlers see it.
#[derive(Debug)]
pub struct RequestCtx {
    pub body: Value,
    pub query: HashMap<String, String>,
    pub client_ip: IpAddr,
}

impl RequestCtx {
    /// Look up a parameter by name: JSON body first, then the query string.
    /// Non-string JSON scalars are stringified so `{"port": 8080}` and
    /// `?port=8080` read the same.
    pub fn param(&self, key: &str) -> Option<String> {
        match self.body.get(key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Null) | None => {}
            Some(other) => return Some(other.to_string()),
        }
        self.query.get(key).cloned()
    }
}
