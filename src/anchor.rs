//! The pinned trust anchor: reference certificate bytes and their derived
//! public key.
//!
//! The anchor is loaded once, is immutable for the process lifetime, and is
//! shared read-only across concurrent handshakes. A failed load is terminal:
//! it is recorded, never retried, and every later pinning attempt resolves to
//! rejection.

use std::{
    fmt, fs, io,
    path::Path,
    sync::{Arc, OnceLock},
};

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::chain;

/// Errors loading the reference certificate asset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The named certificate asset does not exist.
    #[error("pinned certificate asset not found")]
    NotFound,
    /// The asset exists but could not be read or is not a DER certificate.
    #[error("pinned certificate asset is unreadable")]
    Unreadable,
}

/// The exact expected leaf certificate, held as immutable DER bytes.
///
/// Comparison against a presented certificate is byte-for-byte over the DER
/// encoding; no normalization or re-encoding is performed. The subject public
/// key is derived lazily, at most once, and the derivation result (including
/// failure) is cached.
pub struct PinnedCertificate {
    der: Vec<u8>,
    spki: OnceCell<Option<Vec<u8>>>,
}

impl PinnedCertificate {
    /// Builds an anchor from raw DER bytes, e.g. an `include_bytes!` asset.
    ///
    /// Empty input or bytes that do not have the outer shape of a DER
    /// certificate are `LoadError::Unreadable`.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self, LoadError> {
        let der = der.into();
        if der.is_empty() || !chain::is_der_certificate(&der) {
            return Err(LoadError::Unreadable);
        }
        Ok(Self {
            der,
            spki: OnceCell::new(),
        })
    }

    /// Reads the bundled certificate `<dir>/<name>.der`, where `name` is the
    /// anchor's logical name, conventionally the pinned host's domain.
    pub fn load(dir: &Path, name: &str) -> Result<Self, LoadError> {
        let path = dir.join(format!("{name}.der"));
        let der = fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Unreadable,
        })?;
        Self::from_der(der)
    }

    /// The anchor certificate's raw DER bytes. Never empty.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The anchor's subject public key as raw SPKI/DER bytes, or `None` if no
    /// key can be extracted. Derived on first use, then served from cache.
    pub fn public_key(&self) -> Option<&[u8]> {
        self.spki
            .get_or_init(|| chain::public_key_of(&self.der).map(<[u8]>::to_vec).ok())
            .as_deref()
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedCertificate")
            .field("der_len", &self.der.len())
            .field("fingerprint", &sha256_hex(&self.der))
            .finish()
    }
}

/// Hex SHA-256 fingerprint, used to identify certificates in diagnostics
/// without dumping key material.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

static PROCESS_ANCHOR: OnceLock<Result<Arc<PinnedCertificate>, LoadError>> = OnceLock::new();

/// Loads the process-wide anchor exactly once.
///
/// The first call runs `load` and records its result, success or failure;
/// every later call (from any thread) returns the recorded result without
/// re-running the loader. A recorded failure stays failed for the process
/// lifetime.
pub fn init_process_anchor<F>(load: F) -> Result<Arc<PinnedCertificate>, LoadError>
where
    F: FnOnce() -> Result<PinnedCertificate, LoadError>,
{
    PROCESS_ANCHOR.get_or_init(|| load().map(Arc::new)).clone()
}

/// The recorded process-wide anchor, or `None` if
/// [`init_process_anchor`] has not run yet.
pub fn process_anchor() -> Option<Result<Arc<PinnedCertificate>, LoadError>> {
    PROCESS_ANCHOR.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor_der() -> Vec<u8> {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["pinned.example".to_string()]).unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn from_der_keeps_bytes_verbatim() {
        let der = anchor_der();
        let anchor = PinnedCertificate::from_der(der.clone()).unwrap();
        assert_eq!(anchor.der(), der.as_slice());
    }

    #[test]
    fn empty_bytes_are_unreadable() {
        assert_eq!(
            PinnedCertificate::from_der(Vec::new()).unwrap_err(),
            LoadError::Unreadable
        );
    }

    #[test]
    fn non_certificate_bytes_are_unreadable() {
        assert_eq!(
            PinnedCertificate::from_der(b"-----BEGIN CERTIFICATE-----".to_vec()).unwrap_err(),
            LoadError::Unreadable
        );
    }

    #[test]
    fn load_finds_named_asset() {
        let dir = tempfile::tempdir().unwrap();
        let der = anchor_der();
        fs::write(dir.path().join("pinned.example.der"), &der).unwrap();

        let anchor = PinnedCertificate::load(dir.path(), "pinned.example").unwrap();
        assert_eq!(anchor.der(), der.as_slice());
    }

    #[test]
    fn load_reports_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            PinnedCertificate::load(dir.path(), "pinned.example").unwrap_err(),
            LoadError::NotFound
        );
    }

    #[test]
    fn load_reports_garbage_asset() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pinned.example.der"), b"junk").unwrap();
        assert_eq!(
            PinnedCertificate::load(dir.path(), "pinned.example").unwrap_err(),
            LoadError::Unreadable
        );
    }

    #[test]
    fn public_key_is_derived_once_and_cached() {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["pinned.example".to_string()]).unwrap();
        let anchor =
            PinnedCertificate::from_der(params.self_signed(&key).unwrap().der().to_vec()).unwrap();

        let first = anchor.public_key().unwrap();
        assert_eq!(first, key.public_key_der().as_slice());

        // Same cached allocation on the second call.
        let second = anchor.public_key().unwrap();
        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    // The process-wide cell is shared by every test in this binary, so its
    // whole lifecycle lives in one test: the first recorded result wins and
    // a later, healthier loader is never consulted.
    #[test]
    fn process_anchor_records_first_result_forever() {
        assert!(process_anchor().is_none());

        let first = init_process_anchor(|| Err(LoadError::NotFound));
        assert_eq!(first.unwrap_err(), LoadError::NotFound);

        let der = anchor_der();
        let second = init_process_anchor(|| PinnedCertificate::from_der(der));
        assert_eq!(second.unwrap_err(), LoadError::NotFound);

        assert!(matches!(process_anchor(), Some(Err(LoadError::NotFound))));
    }
}
