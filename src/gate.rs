//! The handshake gate: the callback boundary between the transport layer and
//! the pinning evaluator.
//!
//! Each handshake runs the one-shot sequence *challenge received → chain
//! extracted → evaluated → resumed or aborted*. There is no retry and no
//! shared mutable state across handshakes; the gate holds nothing but the
//! read-only trust anchor (or the recorded failure to load it).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    anchor::{LoadError, PinnedCertificate},
    chain::ExtractError,
    evaluate::{evaluate, PinningVerdict},
};

/// The gate's answer to the transport layer. Exactly one is produced per
/// handshake challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Proceed with the credential the server itself presented. The gate
    /// never manufactures or substitutes a credential.
    UseCredential,
    /// Cancel the handshake; no credential is supplied and no data is
    /// exchanged. The peer is not told why.
    Cancel,
}

/// Fields the pinning decision for every handshake challenge.
///
/// May be invoked concurrently from arbitrary transport worker threads; the
/// evaluation path performs no blocking I/O.
#[derive(Debug, Clone)]
pub struct HandshakeGate {
    anchor: Result<Arc<PinnedCertificate>, LoadError>,
}

impl HandshakeGate {
    /// Builds a gate around a loaded trust anchor.
    pub fn new(anchor: Arc<PinnedCertificate>) -> Self {
        Self { anchor: Ok(anchor) }
    }

    /// Builds a gate directly from a load result.
    ///
    /// A failed load is terminal: the gate keeps the recorded error and
    /// cancels every handshake without re-attempting the read.
    pub fn from_load(anchor: Result<Arc<PinnedCertificate>, LoadError>) -> Self {
        Self { anchor }
    }

    /// The trust anchor, or the load failure recorded at construction.
    pub fn anchor(&self) -> Result<&PinnedCertificate, LoadError> {
        match &self.anchor {
            Ok(anchor) => Ok(anchor),
            Err(err) => Err(*err),
        }
    }

    /// Answers one handshake challenge for `host`.
    ///
    /// `chain` is the chain presented by the peer, leaf first; `None` means
    /// the transport had no server trust to present at all (distinct from an
    /// empty chain), which aborts immediately. Everything else goes through
    /// the evaluator, whose accepting verdicts map to
    /// [`Disposition::UseCredential`] and whose rejection maps to
    /// [`Disposition::Cancel`].
    pub fn respond<C: AsRef<[u8]>>(&self, host: &str, chain: Option<&[C]>) -> Disposition {
        let anchor = match &self.anchor {
            Ok(anchor) => anchor,
            Err(err) => {
                warn!(host, error = %err, "trust anchor unavailable, canceling handshake");
                return Disposition::Cancel;
            }
        };

        let Some(chain) = chain else {
            warn!(host, cause = %ExtractError::NoChain, "canceling handshake");
            return Disposition::Cancel;
        };

        match evaluate(chain, anchor) {
            verdict if verdict.is_accepted() => {
                debug!(host, ?verdict, "pinning passed, resuming handshake");
                Disposition::UseCredential
            }
            _ => {
                warn!(host, "pinning failed, canceling handshake");
                Disposition::Cancel
            }
        }
    }

    /// Runs the evaluator without mapping to a disposition. Useful for
    /// diagnostics and tests; `respond` is the transport-facing surface.
    pub fn verdict<C: AsRef<[u8]>>(&self, chain: &[C]) -> PinningVerdict {
        match &self.anchor {
            Ok(anchor) => evaluate(chain, anchor),
            Err(_) => PinningVerdict::Rejected,
        }
    }
}
