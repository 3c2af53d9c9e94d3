use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "tether";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port the serve command binds when none is given.
pub const DEFAULT_PORT: u16 = 4180;

/// Get the application data directory
/// ~/.tether/ on all platforms (token table, TLS identity, registry)
pub fn data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(".tether")
}

/// Token table file (SHA-256 hash -> label/created_at; never plaintext)
pub fn tokens_path() -> PathBuf {
    data_dir().join("tokens.json")
}

/// Self-signed server certificate, PEM
pub fn cert_path() -> PathBuf {
    data_dir().join("cert.pem")
}

/// Server private key, PEM (owner read/write only)
pub fn key_path() -> PathBuf {
    data_dir().join("key.pem")
}

/// Project registry directory, maintained by the surrounding CLI.
/// Read-only from this crate's point of view.
pub fn registry_dir() -> PathBuf {
    data_dir().join("projects")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "tether=info,warn"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_under_home() {
        let dir = data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(".tether"));
    }

    #[test]
    fn state_files_under_data_dir() {
        let data = data_dir();
        assert!(tokens_path().starts_with(&data));
        assert!(cert_path().starts_with(&data));
        assert!(key_path().starts_with(&data));
        assert!(registry_dir().starts_with(&data));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
