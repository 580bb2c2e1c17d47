//! The pinning decision engine.
//!
//! [`evaluate`] is a pure function of the presented chain and the anchor: no
//! delegate object, no interior mutability, no I/O. Concurrent handshakes can
//! evaluate in parallel without coordination.

use tracing::debug;

use crate::{
    anchor::{sha256_hex, PinnedCertificate},
    chain,
};

/// The outcome of one pinning evaluation. Produced fresh per handshake
/// attempt and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningVerdict {
    /// The leaf certificate's DER bytes equal the anchor's exactly.
    AcceptedByCertificate,
    /// The leaf's subject public key equals the anchor's; the certificate
    /// itself differs (e.g. a reissue over the same key pair).
    AcceptedByKey,
    /// Neither pin matched, or the chain was unusable.
    Rejected,
}

impl PinningVerdict {
    /// True for either accepting verdict.
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            PinningVerdict::AcceptedByCertificate | PinningVerdict::AcceptedByKey
        )
    }
}

/// Decides whether the presented chain matches the anchor.
///
/// Checks run in order and short-circuit:
///
/// 1. no leaf in the chain: [`PinningVerdict::Rejected`];
/// 2. leaf DER equals anchor DER: [`PinningVerdict::AcceptedByCertificate`];
/// 3. leaf SPKI equals anchor SPKI: [`PinningVerdict::AcceptedByKey`];
/// 4. otherwise [`PinningVerdict::Rejected`].
///
/// A failed key extraction on either side counts as a failed comparison on
/// the key path, never as an error: the only possible outcomes are the three
/// verdicts.
pub fn evaluate<C: AsRef<[u8]>>(chain: &[C], anchor: &PinnedCertificate) -> PinningVerdict {
    let Some(leaf) = chain::leaf_of(chain) else {
        debug!(cause = %chain::ExtractError::NoLeaf, "rejecting");
        return PinningVerdict::Rejected;
    };

    if leaf == anchor.der() {
        debug!("certificate pin matched");
        return PinningVerdict::AcceptedByCertificate;
    }

    match (chain::public_key_of(leaf).ok(), anchor.public_key()) {
        (Some(leaf_key), Some(anchor_key)) if leaf_key == anchor_key => {
            debug!("public key pin matched");
            PinningVerdict::AcceptedByKey
        }
        _ => {
            debug!(presented = %sha256_hex(leaf), "neither pin matched, rejecting");
            PinningVerdict::Rejected
        }
    }
}
