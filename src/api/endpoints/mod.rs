//! Request handlers, grouped by concern.

pub mod assets;
pub mod meta;
pub mod projects;
pub mod tasks;
