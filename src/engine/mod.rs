//! Binding between an agent and the DTLS engine doing the actual protocol
//! work.
//!
//! The engine is fed whole datagrams and hands whole datagrams back. It
//! never touches a socket or a clock of ours; the agent decides when to
//! feed it and when a retransmission is due.

use std::time::Duration;

use crate::srtp::KeyingMaterial;
use crate::Error;

mod io_buf;
mod ossl;

pub(crate) use ossl::OsslEngine;

/// Warn if any datagram we are about to send is above this size.
pub(crate) const DATAGRAM_MTU_WARN: usize = 1280;

/// What a single step of the engine produced.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Nothing more can happen without further input or a timeout.
    Pending,
    /// The handshake finished in this step.
    HandshakeComplete,
    /// A decrypted application record.
    ApplicationData(Vec<u8>),
    /// The peer sent close_notify.
    PeerClosed,
}

/// Feed bytes in, drain bytes out, query state.
///
/// `advance` and `handle_timeout` are called repeatedly until they return
/// [`Progress::Pending`] (or an error). Any datagram produced along the way
/// is collected with `pop_outgoing`.
pub(crate) trait Engine: Send {
    /// Queue one datagram received from the network.
    fn push_incoming(&mut self, datagram: &[u8]);

    /// Process queued input.
    fn advance(&mut self) -> Result<Progress, Error>;

    /// Called when the retransmission timer fired.
    fn handle_timeout(&mut self) -> Result<Progress, Error>;

    /// Next datagram to send, if any.
    fn pop_outgoing(&mut self) -> Option<Vec<u8>>;

    /// How long to wait for the peer before retransmitting the last flight.
    ///
    /// `None` once the handshake is complete, or while there is no flight
    /// of ours in the air.
    fn retransmit_timeout(&self) -> Option<Duration>;

    fn is_handshake_complete(&self) -> bool;

    /// DER of the peer's certificate.
    fn peer_certificate(&self) -> Option<Vec<u8>>;

    /// Wire name of the negotiated SRTP protection profile.
    fn selected_srtp_profile(&self) -> Option<String>;

    fn export_keying_material(&self, len: usize) -> Result<KeyingMaterial, Error>;

    fn write_application_data(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Send close_notify. Errors are swallowed, the session is going away.
    fn shutdown(&mut self);
}
