//! Bearer-token store with per-client-IP brute-force lockout.
//!
//! Tokens are stored hash-only: the plaintext is returned exactly once at
//! creation and is unrecoverable afterwards, so a leaked table file cannot
//! be replayed. Revocation by hash prefix is the only destruction path —
//! tokens never expire by age.
//!
//! Lockout is tracked per client IP, not per token: one network position
//! trying many tokens is throttled regardless of which ones it tries. The
//! failure window is pruned lazily on each read; under single-worker
//! dispatch no background reaper or extra synchronization is needed.

use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Failures within the window that lock an IP out.
pub const MAX_FAILURES: usize = 10;

/// Trailing window over which failures are counted.
pub const LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Hex chars of the hash exposed as a token's public identifier.
const HASH_PREFIX_LEN: usize = 8;

/// Persisted per-token metadata. The map key is the SHA-256 hash (hex).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    pub label: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Non-secret listing entry: never the full hash, never the plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSummary {
    pub label: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub hash_prefix: String,
}

/// Errors from token table persistence.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Token table I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Token table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Hashed bearer tokens plus ephemeral per-IP failure counters.
pub struct TokenStore {
    path: PathBuf,
    table: HashMap<String, TokenMeta>,
    failures: HashMap<IpAddr, Vec<Instant>>,
    window: Duration,
}

impl TokenStore {
    /// Open the store, loading the table file if it exists.
    /// A missing file is an empty table, not an error.
    pub fn open(path: PathBuf) -> Result<Self, TokenStoreError> {
        let table = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            table,
            failures: HashMap::new(),
            window: LOCKOUT_WINDOW,
        })
    }

    /// Issue a new token. Only the hash is stored; the plaintext is
    /// returned exactly once, here.
    pub fn generate(&mut self, label: &str) -> Result<String, TokenStoreError> {
        let token = generate_token();
        self.table.insert(
            hash_token(&token),
            TokenMeta {
                label: label.to_string(),
                created_at: chrono::Utc::now(),
            },
        );
        self.persist()?;
        Ok(token)
    }

    /// Validate a presented token for a client.
    ///
    /// A locked-out IP is rejected before the token is even hashed.
    /// Success clears the IP's failure history; failure records one entry.
    pub fn validate(&mut self, token: &str, client_ip: IpAddr) -> bool {
        if self.is_locked_out(client_ip) {
            return false;
        }
        if self.table.contains_key(&hash_token(token)) {
            self.failures.remove(&client_ip);
            true
        } else {
            self.failures.entry(client_ip).or_default().push(Instant::now());
            false
        }
    }

    /// Whether an IP has accumulated enough recent failures to be locked
    /// out. Stale entries are pruned here, on read.
    pub fn is_locked_out(&mut self, client_ip: IpAddr) -> bool {
        let Some(entries) = self.failures.get_mut(&client_ip) else {
            return false;
        };
        let now = Instant::now();
        entries.retain(|t| now.duration_since(*t) < self.window);
        entries.len() >= MAX_FAILURES
    }

    /// Remove every token whose hash starts with `prefix`.
    /// Returns whether anything was removed. An empty prefix matches
    /// nothing rather than everything.
    pub fn revoke(&mut self, prefix: &str) -> Result<bool, TokenStoreError> {
        if prefix.is_empty() {
            return Ok(false);
        }
        let before = self.table.len();
        self.table.retain(|hash, _| !hash.starts_with(prefix));
        let removed = self.table.len() != before;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Non-secret metadata for every issued token, newest first.
    pub fn list(&self) -> Vec<TokenSummary> {
        let mut out: Vec<TokenSummary> = self
            .table
            .iter()
            .map(|(hash, meta)| TokenSummary {
                label: meta.label.clone(),
                created_at: meta.created_at,
                hash_prefix: hash.chars().take(HASH_PREFIX_LEN).collect(),
            })
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn persist(&self) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.table)?)?;
        Ok(())
    }
}

/// Hash a bearer token with SHA-256, hex-encoded.
pub fn hash_token(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ip() -> IpAddr {
        "192.168.1.20".parse().unwrap()
    }

    fn test_store() -> (TokenStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::open(tmp.path().join("tokens.json")).unwrap();
        (store, tmp)
    }

    #[test]
    fn generated_token_validates() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("phone").unwrap();
        assert!(store.validate(&token, test_ip()));
    }

    #[test]
    fn unknown_token_fails() {
        let (mut store, _tmp) = test_store();
        store.generate("phone").unwrap();
        assert!(!store.validate("not-a-token", test_ip()));
    }

    #[test]
    fn revoked_token_fails() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("phone").unwrap();
        let prefix = store.list()[0].hash_prefix.clone();

        assert!(store.revoke(&prefix).unwrap());
        assert!(!store.validate(&token, test_ip()));
    }

    #[test]
    fn revoke_reports_nothing_removed() {
        let (mut store, _tmp) = test_store();
        store.generate("phone").unwrap();
        assert!(!store.revoke("zzzzzzzz").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn revoke_empty_prefix_is_a_noop() {
        let (mut store, _tmp) = test_store();
        store.generate("phone").unwrap();
        assert!(!store.revoke("").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn table_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");

        let token = {
            let mut store = TokenStore::open(path.clone()).unwrap();
            store.generate("phone").unwrap()
        };

        let mut reopened = TokenStore::open(path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.validate(&token, test_ip()));
    }

    #[test]
    fn list_exposes_metadata_only() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("laptop").unwrap();

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "laptop");
        assert_eq!(entries[0].hash_prefix.len(), HASH_PREFIX_LEN);
        // The prefix is a prefix of the hash, not of the plaintext
        assert!(hash_token(&token).starts_with(&entries[0].hash_prefix));
        assert!(!token.starts_with(&entries[0].hash_prefix));
    }

    #[test]
    fn eleventh_attempt_fails_even_with_correct_token() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("phone").unwrap();
        let ip = test_ip();

        for _ in 0..MAX_FAILURES {
            assert!(!store.validate("wrong-token", ip));
        }
        assert!(!store.validate(&token, ip));
    }

    #[test]
    fn lockout_is_per_ip() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("phone").unwrap();
        let attacker: IpAddr = "10.0.0.9".parse().unwrap();

        for _ in 0..MAX_FAILURES {
            store.validate("wrong-token", attacker);
        }
        assert!(store.is_locked_out(attacker));
        assert!(store.validate(&token, test_ip()));
    }

    #[test]
    fn success_clears_failure_history() {
        let (mut store, _tmp) = test_store();
        let token = store.generate("phone").unwrap();
        let ip = test_ip();

        for _ in 0..MAX_FAILURES - 1 {
            store.validate("wrong-token", ip);
        }
        assert!(store.validate(&token, ip));

        // History is gone: the next run of failures starts from zero
        for _ in 0..MAX_FAILURES - 1 {
            store.validate("wrong-token", ip);
        }
        assert!(store.validate(&token, ip));
    }

    #[test]
    fn lockout_expires_with_the_window() {
        let (mut store, _tmp) = test_store();
        store.window = Duration::from_millis(20);
        let token = store.generate("phone").unwrap();
        let ip = test_ip();

        for _ in 0..MAX_FAILURES {
            store.validate("wrong-token", ip);
        }
        assert!(!store.validate(&token, ip));

        std::thread::sleep(Duration::from_millis(30));
        assert!(store.validate(&token, ip));
    }

    #[test]
    fn generate_token_is_unique_and_urlsafe() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert!(t1
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[test]
    fn corrupt_table_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TokenStore::open(path),
            Err(TokenStoreError::Parse(_))
        ));
    }
}
