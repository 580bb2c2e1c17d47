//! Leaf extraction and public-key parsing for presented certificate chains.
//!
//! A chain is anything that can be viewed as a sequence of DER certificate
//! byte buffers, leaf first, in chain-of-trust order. The concrete transport
//! representation stays behind this interface; the evaluator never sees it.

use thiserror::Error;

/// Errors raised while pulling material out of a presented chain.
///
/// These never cross the evaluator boundary: each converts to a failed
/// comparison on the path that hit it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    /// The transport presented no chain at all.
    #[error("no server chain was presented")]
    NoChain,
    /// The chain was presented but contains no certificates.
    #[error("server chain contains no leaf certificate")]
    NoLeaf,
    /// The leaf carries no extractable public key.
    #[error("certificate has no extractable public key")]
    NoKey,
}

const TAG_SEQUENCE: u8 = 0x30;
// Context [0]: the optional EXPLICIT version field of TBSCertificate.
const TAG_VERSION: u8 = 0xa0;

/// Returns the first certificate in presentation order, or `None` if the
/// chain is empty.
pub fn leaf_of<C: AsRef<[u8]>>(chain: &[C]) -> Option<&[u8]> {
    chain.first().map(|cert| cert.as_ref())
}

/// Extracts the subject public key of a DER-encoded X.509 certificate.
///
/// The returned slice is the raw `subjectPublicKeyInfo` element, tag and
/// length included. SPKI/DER is the one canonical key representation used on
/// both sides of the key-pin comparison; comparing anything else (or mixed
/// encodings) would silently defeat key pinning.
pub fn public_key_of(cert: &[u8]) -> Result<&[u8], ExtractError> {
    subject_public_key_info(cert).ok_or(ExtractError::NoKey)
}

/// True if `der` parses as a single well-formed DER SEQUENCE spanning the
/// whole buffer, the outer shape of every X.509 certificate.
pub(crate) fn is_der_certificate(der: &[u8]) -> bool {
    let mut cursor = Cursor::new(der);
    match cursor.element() {
        Some(element) => element.tag == TAG_SEQUENCE && cursor.rest.is_empty(),
        None => false,
    }
}

/// Walks the TBSCertificate to its `subjectPublicKeyInfo` element:
///
/// ```text
/// Certificate ::= SEQUENCE {
///     tbsCertificate  SEQUENCE {
///         version         [0] EXPLICIT Version OPTIONAL,
///         serialNumber, signature, issuer, validity, subject,
///         subjectPublicKeyInfo SEQUENCE { ... },   <- target
///         ...
///     },
///     signatureAlgorithm, signatureValue
/// }
/// ```
fn subject_public_key_info(cert: &[u8]) -> Option<&[u8]> {
    let certificate = Cursor::new(cert).element()?;
    if certificate.tag != TAG_SEQUENCE {
        return None;
    }
    let tbs = Cursor::new(certificate.content).element()?;
    if tbs.tag != TAG_SEQUENCE {
        return None;
    }

    let mut fields = Cursor::new(tbs.content);
    if fields.peek() == Some(TAG_VERSION) {
        fields.element()?;
    }
    // serialNumber, signature, issuer, validity, subject
    for _ in 0..5 {
        fields.element()?;
    }

    let spki = fields.element()?;
    if spki.tag != TAG_SEQUENCE {
        return None;
    }
    Some(spki.raw)
}

/// One decoded TLV element. `raw` spans the full element including its
/// header; `content` is the value octets only.
struct Element<'a> {
    tag: u8,
    raw: &'a [u8],
    content: &'a [u8],
}

/// Minimal DER cursor: just enough ASN.1 to walk to the SPKI element.
struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }

    fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.rest.len() {
            return None;
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Some(head)
    }

    /// Decodes a DER length field. Indefinite and over-long forms are not
    /// valid DER and fail.
    fn length(&mut self) -> Option<usize> {
        let first = *self.take(1)?.first()?;
        if first < 0x80 {
            return Some(usize::from(first));
        }
        let octets = usize::from(first & 0x7f);
        if octets == 0 || octets > 4 {
            return None;
        }
        let mut length = 0usize;
        for byte in self.take(octets)? {
            length = length.checked_mul(256)?.checked_add(usize::from(*byte))?;
        }
        Some(length)
    }

    /// Consumes one TLV element.
    fn element(&mut self) -> Option<Element<'a>> {
        let start = self.rest;
        let tag = *self.take(1)?.first()?;
        let length = self.length()?;
        let content = self.take(length)?;
        let raw = &start[..start.len() - self.rest.len()];
        Some(Element { tag, raw, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed(key: &rcgen::KeyPair) -> Vec<u8> {
        let params = rcgen::CertificateParams::new(vec!["pinned.example".to_string()]).unwrap();
        params.self_signed(key).unwrap().der().to_vec()
    }

    #[test]
    fn leaf_is_first_in_presentation_order() {
        let chain: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![4, 5, 6]];
        assert_eq!(leaf_of(&chain), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn empty_chain_has_no_leaf() {
        let chain: Vec<Vec<u8>> = Vec::new();
        assert_eq!(leaf_of(&chain), None);
    }

    #[test]
    fn extracted_spki_matches_keypair() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = self_signed(&key);

        let spki = public_key_of(&cert).unwrap();
        assert_eq!(spki, key.public_key_der().as_slice());
    }

    #[test]
    fn same_key_different_certificates_share_spki() {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["pinned.example".to_string()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::OrganizationName, "Renewed");
        let first = self_signed(&key);
        let second = params.self_signed(&key).unwrap().der().to_vec();

        assert_ne!(first, second);
        assert_eq!(
            public_key_of(&first).unwrap(),
            public_key_of(&second).unwrap()
        );
    }

    #[test]
    fn garbage_has_no_key() {
        assert_eq!(public_key_of(b"not a certificate"), Err(ExtractError::NoKey));
        assert_eq!(public_key_of(&[]), Err(ExtractError::NoKey));
    }

    #[test]
    fn truncated_certificate_has_no_key() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = self_signed(&key);
        assert_eq!(public_key_of(&cert[..cert.len() / 2]), Err(ExtractError::NoKey));
    }

    #[test]
    fn indefinite_length_is_rejected() {
        // 0x80 length octet marks an indefinite length, which DER forbids.
        assert_eq!(public_key_of(&[0x30, 0x80, 0x00, 0x00]), Err(ExtractError::NoKey));
    }

    #[test]
    fn certificate_shape_check() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = self_signed(&key);
        assert!(is_der_certificate(&cert));

        assert!(!is_der_certificate(&[]));
        assert!(!is_der_certificate(b"not a certificate"));

        // Trailing bytes past the outer SEQUENCE are not a certificate.
        let mut padded = cert;
        padded.push(0);
        assert!(!is_der_certificate(&padded));
    }
}
