//! Tether: remote control for a local desktop session from a phone on the
//! same network. TLS with a pinned self-signed certificate, bearer tokens,
//! and a small fixed JSON API.

pub mod api;
pub mod cert;
pub mod config;
pub mod registry;
pub mod tasks;
pub mod tokens;
