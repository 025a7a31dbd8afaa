use thiserror::Error;

use crate::fingerprint::HashAlgorithm;

/// Errors produced by the DTLS agent and its process-wide context.
#[derive(Debug, Error)]
pub enum Error {
    /// Certificate generation/loading or engine context setup failed.
    ///
    /// Fatal at startup, there is no degraded mode without a certificate.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A method was called in a state that does not support it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Application data can only be sent while connected.
    #[error("DTLS is not connected")]
    NotConnected,

    /// The peer certificate digest does not equal the signaled one.
    #[error("Fingerprint mismatch ({algorithm}): expected {expected}, got {actual}")]
    FingerprintMismatch {
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    /// The handshake completed before any remote fingerprint was set.
    #[error("No remote fingerprint set")]
    MissingRemoteFingerprint,

    /// The peer completed the handshake without presenting a certificate.
    #[error("Peer did not provide a certificate")]
    MissingPeerCertificate,

    /// The negotiated SRTP protection profile is not in the profile table.
    #[error("Unsupported SRTP profile: {0}")]
    UnsupportedCipherSuite(String),

    /// Malformed or unexpected handshake/record data, or a fatal alert.
    #[error("DTLS protocol error: {0}")]
    Protocol(String),

    /// A fingerprint string could not be parsed.
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(value: openssl::error::ErrorStack) -> Self {
        Error::Configuration(value.to_string())
    }
}
