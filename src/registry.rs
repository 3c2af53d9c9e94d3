//! Read-only view of the surrounding CLI's project registry.
//!
//! The registry is a directory of `<name>.json` descriptors maintained by
//! the broader tool; this crate only reads them. A missing directory or an
//! unreadable descriptor is "no data", never an error — project-scoped
//! endpoints simply see fewer projects.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One known local project as recorded by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRecord>,
}

/// An automation session attached to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    root: PathBuf,
}

impl ProjectRegistry {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// All readable project descriptors, sorted by name.
    pub fn projects(&self) -> Vec<ProjectRecord> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(root = %self.root.display(), error = %e, "no project registry");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
            {
                Ok(record) => out.push(record),
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "skipping unreadable project descriptor");
                }
            }
        }
        out.sort_by(|a: &ProjectRecord, b: &ProjectRecord| a.name.cmp(&b.name));
        out
    }

    /// Look up one project by name. Names with path separators or dot
    /// segments never resolve.
    pub fn get(&self, name: &str) -> Option<ProjectRecord> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        let raw = fs::read_to_string(self.root.join(format!("{name}.json"))).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Projects that currently carry a session, with their session data.
    pub fn sessions(&self) -> Vec<(String, SessionRecord)> {
        self.projects()
            .into_iter()
            .filter_map(|p| p.session.map(|s| (p.name, s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project(dir: &std::path::Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{name}.json")), body).unwrap();
    }

    #[test]
    fn missing_root_is_empty_not_error() {
        let registry = ProjectRegistry::new(PathBuf::from("/nonexistent/tether-registry"));
        assert!(registry.projects().is_empty());
        assert!(registry.get("api").is_none());
        assert!(registry.sessions().is_empty());
    }

    #[test]
    fn lists_projects_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        write_project(tmp.path(), "web", r#"{"name":"web"}"#);
        write_project(tmp.path(), "api", r#"{"name":"api","status":"idle"}"#);

        let registry = ProjectRegistry::new(tmp.path().to_path_buf());
        let projects = registry.projects();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "api");
        assert_eq!(projects[1].name, "web");
    }

    #[test]
    fn skips_unreadable_descriptors() {
        let tmp = tempfile::tempdir().unwrap();
        write_project(tmp.path(), "good", r#"{"name":"good"}"#);
        write_project(tmp.path(), "bad", "{broken");
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let registry = ProjectRegistry::new(tmp.path().to_path_buf());
        let projects = registry.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "good");
    }

    #[test]
    fn get_returns_full_record() {
        let tmp = tempfile::tempdir().unwrap();
        write_project(
            tmp.path(),
            "api",
            r#"{"name":"api","status":"running","session":{"id":"s-1","started_at":"2026-08-01T10:00:00Z"}}"#,
        );

        let registry = ProjectRegistry::new(tmp.path().to_path_buf());
        let record = registry.get("api").unwrap();
        assert_eq!(record.status.as_deref(), Some("running"));
        assert_eq!(record.session.unwrap().id, "s-1");
    }

    #[test]
    fn get_rejects_traversal_names() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::new(tmp.path().to_path_buf());
        assert!(registry.get("../etc/passwd").is_none());
        assert!(registry.get("a/b").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn sessions_only_include_projects_with_one() {
        let tmp = tempfile::tempdir().unwrap();
        write_project(tmp.path(), "idle", r#"{"name":"idle"}"#);
        write_project(
            tmp.path(),
            "busy",
            r#"{"name":"busy","session":{"id":"s-2"}}"#,
        );

        let registry = ProjectRegistry::new(tmp.path().to_path_buf());
        let sessions = registry.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0, "busy");
        assert_eq!(sessions[0].1.id, "s-2");
    }
}
