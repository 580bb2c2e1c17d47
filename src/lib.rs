//! Certificate and public-key pinning for TLS clients.
//!
//! Pinning restricts a trusted peer's identity to a pre-known certificate or
//! key instead of relying solely on certificate-authority trust. This crate
//! decides, at handshake time, whether a server's presented certificate chain
//! matches an application-pinned trust anchor, protecting the client against
//! interception even when the attacker holds a certificate issued by a
//! trusted public CA.
//!
//! Two independent strategies are applied in order, with a safe default of
//! rejection:
//!
//! 1. **Certificate pin**: the leaf certificate's DER bytes must equal the
//!    anchor's DER bytes exactly. Strongest check; matches the exact issued
//!    artifact.
//! 2. **Public-key pin**: the leaf's SubjectPublicKeyInfo must equal the
//!    anchor's. Survives certificate reissuance as long as the key pair is
//!    unchanged.
//!
//! Comparisons are strict binary equality over DER bytes. There is no
//! normalization or re-encoding: a transcoded but semantically equivalent
//! certificate is rejected.
//!
//! The crate performs no chain *validation* (expiry, revocation, CA path);
//! that is the TLS stack's concern. It only adds a pinning gate on top.
//!
//! # Usage
//!
//! Load the anchor once at startup, then hand the gate to your transport
//! boundary:
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//! use tls_pinning::{Disposition, HandshakeGate, PinnedCertificate};
//!
//! # fn main() -> Result<(), tls_pinning::LoadError> {
//! let anchor = Arc::new(PinnedCertificate::load(Path::new("assets"), "pinned.example")?);
//! let gate = HandshakeGate::new(anchor);
//!
//! // Per connection, with the chain as presented by the peer (leaf first):
//! let chain: Vec<Vec<u8>> = vec![];
//! match gate.respond("pinned.example", Some(&chain)) {
//!     Disposition::UseCredential => { /* proceed with the server's credential */ }
//!     Disposition::Cancel => { /* abort the connection */ }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! With the default `rustls` feature, [`PinnedClientConfigBuilder`] wires the
//! gate into a `rustls::ClientConfig` directly.

#![warn(missing_docs)]

pub mod anchor;
pub mod chain;
pub mod evaluate;
pub mod gate;
#[cfg(feature = "rustls")]
pub mod verifier;

pub use anchor::{LoadError, PinnedCertificate};
pub use chain::ExtractError;
pub use evaluate::{evaluate, PinningVerdict};
pub use gate::{Disposition, HandshakeGate};
#[cfg(feature = "rustls")]
pub use verifier::{PinnedClientConfigBuilder, PinnedServerVerifier};
