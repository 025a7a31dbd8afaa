//! Certificate fingerprints (RFC 8122 / RFC 4572).
//!
//! A fingerprint is the digest of a certificate's DER encoding. It is the
//! only identity check performed on the peer: there is no chain validation,
//! the digest of the presented certificate must equal the value received
//! over signaling.

use std::fmt;
use std::str::FromStr;

use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::Error;

/// Hash functions usable for fingerprints, named as in the SDP
/// `a=fingerprint` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// All supported algorithms, weakest to strongest.
    pub const ALL: &'static [HashAlgorithm] = &[
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    /// Textual name from the IANA "Hash Function Textual Names" registry.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha-1",
            HashAlgorithm::Sha224 => "sha-224",
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha384 => "sha-384",
            HashAlgorithm::Sha512 => "sha-512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| Error::InvalidFingerprint(format!("unknown hash function: {}", s)))
    }
}

/// A certificate digest together with the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Fingerprint {
    /// Compute the fingerprint of a DER encoded certificate.
    pub fn of(algorithm: HashAlgorithm, certificate_der: &[u8]) -> Self {
        Fingerprint {
            algorithm,
            digest: algorithm.digest(certificate_der),
        }
    }

    /// Parse a hex digest as received from the peer.
    ///
    /// Accepts upper- or lowercase hex, with or without colon separators.
    /// The digest must have exactly the length of the algorithm's output.
    pub fn new(algorithm: HashAlgorithm, hex: &str) -> Result<Self, Error> {
        let digest = parse_hex(hex.trim())?;

        if digest.len() != algorithm.output_len() {
            return Err(Error::InvalidFingerprint(format!(
                "{} digest must be {} bytes, got {}",
                algorithm,
                algorithm.output_len(),
                digest.len()
            )));
        }

        Ok(Fingerprint { algorithm, digest })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Colon separated uppercase hex pairs, for example "AF:12:F6:...".
    pub fn value(&self) -> String {
        format_hex(&self.digest)
    }

    /// Check a DER encoded certificate against this fingerprint.
    ///
    /// The certificate is hashed with this fingerprint's algorithm and the
    /// full digest must be equal.
    pub fn verify(&self, certificate_der: &[u8]) -> Result<(), Error> {
        let actual = Fingerprint::of(self.algorithm, certificate_der);

        if actual.digest != self.digest {
            return Err(Error::FingerprintMismatch {
                algorithm: self.algorithm,
                expected: self.value(),
                actual: actual.value(),
            });
        }

        Ok(())
    }
}

/// Formats as the value of an SDP `a=fingerprint` attribute:
/// `sha-256 AF:12:...`.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.algorithm, self.value())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        let (Some(algorithm), Some(value), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidFingerprint(format!(
                "expected \"<hash-function> <hex>\", got: {}",
                s
            )));
        };

        Fingerprint::new(algorithm.parse()?, value)
    }
}

/// The local certificate's fingerprints, one per supported algorithm.
///
/// Computed once when the [`DtlsContext`](crate::DtlsContext) is built and
/// read-only afterwards. Intended for inclusion in the session description.
#[derive(Debug, Clone)]
pub struct Fingerprints(Vec<Fingerprint>);

impl Fingerprints {
    /// Digest `certificate_der` with every algorithm in [`HashAlgorithm::ALL`].
    pub fn compute(certificate_der: &[u8]) -> Self {
        Fingerprints(
            HashAlgorithm::ALL
                .iter()
                .map(|a| Fingerprint::of(*a, certificate_der))
                .collect(),
        )
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&Fingerprint> {
        self.0.iter().find(|f| f.algorithm == algorithm)
    }

    /// Fingerprints in [`HashAlgorithm::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Fingerprints {
    type Item = &'a Fingerprint;
    type IntoIter = std::slice::Iter<'a, Fingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Format bytes as colon-separated uppercase hex pairs.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

fn parse_hex(s: &str) -> Result<Vec<u8>, Error> {
    let hex: Vec<u8> = s.bytes().filter(|b| *b != b':').collect();

    if hex.is_empty() || hex.len() % 2 != 0 || !hex.iter().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidFingerprint(format!("not a hex digest: {}", s)));
    }

    hex.chunks(2)
        .map(|pair| {
            // Only ascii hex digits remain, so this is valid utf-8.
            let pair = std::str::from_utf8(pair).unwrap_or_default();
            u8::from_str_radix(pair, 16)
                .map_err(|_| Error::InvalidFingerprint(format!("not a hex digest: {}", s)))
        })
        .collect()
}
