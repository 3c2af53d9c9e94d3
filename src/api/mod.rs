//! Remote-control API: dispatch, handlers, and the HTTP(S) listener.

pub mod endpoints;
pub mod error;
pub mod format;
pub mod router;
pub mod server;
pub mod types;
