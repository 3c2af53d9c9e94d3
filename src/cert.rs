//! TLS identity management.
//!
//! Owns one self-signed certificate/key pair on disk, generated lazily on
//! first use and never rotated automatically (explicit regeneration only).
//! With no CA chain, the certificate's SHA-256 fingerprint is the sole
//! trust anchor: the operator compares it out of band against what the
//! phone shows after the handshake.
//!
//! Generation is delegated to the narrow [`CertTool`] trait so everything
//! above it can be tested without touching real key generation.

use std::fs;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Validity of a freshly generated certificate.
const CERT_VALIDITY_DAYS: i64 = 365;

/// Common name on the self-signed certificate.
const CERT_COMMON_NAME: &str = "tether";

/// Errors from certificate operations.
///
/// Any of these is fatal when TLS was requested: the listener refuses to
/// start rather than silently degrading to plaintext.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Certificate generation failed: {0}")]
    Generation(String),
    #[error("Certificate file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Certificate file is not valid PEM")]
    InvalidPem,
    #[error("TLS configuration failed: {0}")]
    TlsConfig(String),
}

/// Narrow interface over the certificate generator.
pub trait CertTool: Send + Sync {
    /// Generate a self-signed certificate and key, both PEM-encoded.
    fn generate(&self, common_name: &str, days: i64) -> Result<(String, String), CertError>;
}

/// Default [`CertTool`]: in-process generation via rcgen.
pub struct RcgenTool;

impl CertTool for RcgenTool {
    fn generate(&self, common_name: &str, days: i64) -> Result<(String, String), CertError> {
        use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
        use time::{Duration, OffsetDateTime};

        let key =
            KeyPair::generate().map_err(|e| CertError::Generation(e.to_string()))?;

        let san_names = vec![
            common_name.to_string(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ];
        let mut params = CertificateParams::new(san_names)
            .map_err(|e| CertError::Generation(e.to_string()))?;

        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ServerAuth);
        params.key_usages.push(KeyUsagePurpose::DigitalSignature);

        // One hour of clock-skew grace on the front edge.
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::hours(1);
        params.not_after = now + Duration::days(days);

        let cert = params
            .self_signed(&key)
            .map_err(|e| CertError::Generation(e.to_string()))?;

        Ok((cert.pem(), key.serialize_pem()))
    }
}

/// Manages the server's self-signed TLS identity on disk.
pub struct CertificateAuthority {
    cert_path: PathBuf,
    key_path: PathBuf,
    tool: Box<dyn CertTool>,
}

impl CertificateAuthority {
    pub fn new(cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self::with_tool(cert_path, key_path, Box::new(RcgenTool))
    }

    pub fn with_tool(cert_path: PathBuf, key_path: PathBuf, tool: Box<dyn CertTool>) -> Self {
        Self {
            cert_path,
            key_path,
            tool,
        }
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// Whether both the certificate and key files exist on disk.
    pub fn is_provisioned(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }

    /// Generate the certificate/key pair if either file is missing.
    /// No-op when both already exist; never rotates a valid pair.
    pub fn ensure_certificate(&self) -> Result<(), CertError> {
        if self.is_provisioned() {
            return Ok(());
        }
        self.write_new()
    }

    /// Explicitly replace the certificate/key pair. Paired phones must
    /// re-verify the new fingerprint afterwards.
    pub fn regenerate(&self) -> Result<(), CertError> {
        self.write_new()
    }

    /// SHA-256 fingerprint of the on-disk certificate,
    /// colon-separated uppercase hex byte pairs.
    pub fn fingerprint(&self) -> Result<String, CertError> {
        let pem = fs::read_to_string(&self.cert_path)?;
        let der = pem_body(&pem).ok_or(CertError::InvalidPem)?;
        Ok(compute_fingerprint(&der))
    }

    /// Server TLS configuration loaded with the managed cert/key.
    /// rustls only negotiates TLS 1.2 and 1.3, which is the required floor.
    pub async fn tls_config(&self) -> Result<RustlsConfig, CertError> {
        // Pin the process-wide provider before any rustls config is built.
        let _ = rustls::crypto::ring::default_provider().install_default();

        RustlsConfig::from_pem_file(&self.cert_path, &self.key_path)
            .await
            .map_err(|e| CertError::TlsConfig(e.to_string()))
    }

    fn write_new(&self) -> Result<(), CertError> {
        let (cert_pem, key_pem) = self.tool.generate(CERT_COMMON_NAME, CERT_VALIDITY_DAYS)?;

        if let Some(parent) = self.cert_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.cert_path, cert_pem)?;
        fs::write(&self.key_path, key_pem)?;
        restrict_key_permissions(&self.key_path)?;

        tracing::info!(cert = %self.cert_path.display(), "TLS certificate written");
        Ok(())
    }
}

/// Compute the SHA-256 fingerprint of a DER-encoded certificate.
///
/// Returns colon-separated hex like "AB:CD:EF:01:..."
pub fn compute_fingerprint(cert_der: &[u8]) -> String {
    let hash = Sha256::digest(cert_der);
    hash.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decode the base64 body of the first PEM block.
fn pem_body(pem: &str) -> Option<Vec<u8>> {
    let mut body = String::new();
    let mut inside = false;
    for line in pem.lines() {
        if line.starts_with("-----BEGIN") {
            inside = true;
            continue;
        }
        if line.starts_with("-----END") {
            break;
        }
        if inside {
            body.push_str(line.trim());
        }
    }
    if body.is_empty() {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(body).ok()
}

#[cfg(unix)]
fn restrict_key_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_key_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTool;

    impl CertTool for FailingTool {
        fn generate(&self, _cn: &str, _days: i64) -> Result<(String, String), CertError> {
            Err(CertError::Generation("tool unavailable".into()))
        }
    }

    fn test_ca(dir: &Path) -> CertificateAuthority {
        CertificateAuthority::new(dir.join("cert.pem"), dir.join("key.pem"))
    }

    #[test]
    fn rcgen_tool_produces_pem_pair() {
        let (cert, key) = RcgenTool.generate("test", 365).unwrap();
        assert!(cert.contains("BEGIN CERTIFICATE"));
        assert!(key.contains("PRIVATE KEY"));
    }

    #[test]
    fn ensure_creates_files_once() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        assert!(!ca.is_provisioned());

        ca.ensure_certificate().unwrap();
        assert!(ca.is_provisioned());
        let first = fs::read(tmp.path().join("cert.pem")).unwrap();

        // Second call must not touch the existing pair
        ca.ensure_certificate().unwrap();
        let second = fs::read(tmp.path().join("cert.pem")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn regenerate_replaces_certificate() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        ca.ensure_certificate().unwrap();
        let before = ca.fingerprint().unwrap();

        ca.regenerate().unwrap();
        let after = ca.fingerprint().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn fingerprint_is_colon_separated_uppercase_hex() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        ca.ensure_certificate().unwrap();

        let fp = ca.fingerprint().unwrap();
        // 32 bytes = 64 hex chars + 31 colons = 95 chars
        assert_eq!(fp.len(), 95);
        let pairs: Vec<&str> = fp.split(':').collect();
        assert_eq!(pairs.len(), 32);
        for pair in pairs {
            assert_eq!(pair.len(), 2);
            assert!(pair
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn fingerprint_matches_der_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        ca.ensure_certificate().unwrap();

        let pem = fs::read_to_string(tmp.path().join("cert.pem")).unwrap();
        let der = pem_body(&pem).unwrap();
        assert_eq!(ca.fingerprint().unwrap(), compute_fingerprint(&der));
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        ca.ensure_certificate().unwrap();

        let mode = fs::metadata(tmp.path().join("key.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failing_tool_surfaces_error_and_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::with_tool(
            tmp.path().join("cert.pem"),
            tmp.path().join("key.pem"),
            Box::new(FailingTool),
        );

        assert!(ca.ensure_certificate().is_err());
        assert!(!ca.is_provisioned());
    }

    #[test]
    fn pem_body_rejects_garbage() {
        assert!(pem_body("not pem at all").is_none());
        assert!(pem_body("").is_none());
    }

    #[tokio::test]
    async fn tls_config_builds_from_generated_pair() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        ca.ensure_certificate().unwrap();
        assert!(ca.tls_config().await.is_ok());
    }

    #[tokio::test]
    async fn tls_config_fails_without_certificate() {
        let tmp = tempfile::tempdir().unwrap();
        let ca = test_ca(tmp.path());
        assert!(ca.tls_config().await.is_err());
    }
}
