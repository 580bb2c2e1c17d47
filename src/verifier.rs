//! rustls integration: a `ServerCertVerifier` that feeds every handshake
//! through the [`HandshakeGate`].
//!
//! This is the thin adapter at the transport boundary. rustls hands it the
//! presented chain during the handshake; the adapter asks the gate for a
//! disposition and maps it back onto rustls's accept/reject vocabulary. The
//! rejection reason is deliberately generic on the wire so pinning internals
//! are not leaked to network peers.
//!
//! Handshake signatures are still verified against the presented certificate
//! via the crypto provider, so proof of key possession holds; chain
//! *validation* (expiry, CA path, revocation) is intentionally not performed
//! here.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    CertificateError, ClientConfig, DigitallySignedStruct, Error as TlsError, SignatureScheme,
};

use crate::{
    anchor::{LoadError, PinnedCertificate},
    gate::{Disposition, HandshakeGate},
};

/// Certificate verifier enforcing the pinning gate on every connection.
#[derive(Debug)]
pub struct PinnedServerVerifier {
    gate: HandshakeGate,
    supported: WebPkiSupportedAlgorithms,
}

impl PinnedServerVerifier {
    /// Builds a verifier around a loaded trust anchor.
    pub fn new(anchor: Arc<PinnedCertificate>) -> Self {
        Self::with_gate(HandshakeGate::new(anchor))
    }

    /// Builds a verifier directly from an anchor load result. A failed load
    /// yields a verifier that cancels every handshake.
    pub fn from_load(anchor: Result<Arc<PinnedCertificate>, LoadError>) -> Self {
        Self::with_gate(HandshakeGate::from_load(anchor))
    }

    fn with_gate(gate: HandshakeGate) -> Self {
        let supported = CryptoProvider::get_default()
            .map(|provider| provider.signature_verification_algorithms)
            .unwrap_or_else(|| {
                rustls::crypto::ring::default_provider().signature_verification_algorithms
            });
        Self { gate, supported }
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let host = match server_name {
            ServerName::DnsName(dns) => dns.as_ref().to_string(),
            other => format!("{other:?}"),
        };

        // Reassemble the chain as presented: leaf first.
        let presented: Vec<&[u8]> = std::iter::once(end_entity.as_ref())
            .chain(intermediates.iter().map(|cert| cert.as_ref()))
            .collect();

        match self.gate.respond(&host, Some(&presented)) {
            Disposition::UseCredential => Ok(ServerCertVerified::assertion()),
            Disposition::Cancel => Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            )),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

/// Builder for a `ClientConfig` whose server verification is the pinning
/// gate.
///
/// ```rust,no_run
/// use tls_pinning::PinnedClientConfigBuilder;
///
/// # fn main() -> Result<(), tls_pinning::LoadError> {
/// let config = PinnedClientConfigBuilder::new()
///     .with_anchor_file("assets", "pinned.example")
///     .build_client_config()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PinnedClientConfigBuilder {
    anchor_file: Option<(PathBuf, String)>,
    anchor_der: Option<Vec<u8>>,
}

impl PinnedClientConfigBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins against the bundled certificate `<dir>/<name>.der`.
    pub fn with_anchor_file(mut self, dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        self.anchor_file = Some((dir.as_ref().to_path_buf(), name.into()));
        self
    }

    /// Pins against raw DER bytes, e.g. an `include_bytes!` asset.
    pub fn with_anchor_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.anchor_der = Some(der.into());
        self
    }

    /// Builds the client configuration.
    ///
    /// Fails with [`LoadError`] if the anchor cannot be loaded; an
    /// application that prefers a terminally-canceling client over a startup
    /// error can instead hand the load result to
    /// [`PinnedServerVerifier::from_load`].
    pub fn build_client_config(self) -> Result<ClientConfig, LoadError> {
        let anchor = match (self.anchor_der, self.anchor_file) {
            (Some(der), _) => PinnedCertificate::from_der(der)?,
            (None, Some((dir, name))) => PinnedCertificate::load(&dir, &name)?,
            (None, None) => return Err(LoadError::NotFound),
        };

        let verifier = PinnedServerVerifier::new(Arc::new(anchor));
        Ok(ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth())
    }
}
