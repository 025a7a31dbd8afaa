use std::time::Duration;

use openssl::ssl::{self, ErrorCode, Ssl, SslStream};

use super::io_buf::IoBuffer;
use super::{Engine, Progress, DATAGRAM_MTU_WARN};
use crate::srtp::{offer_string, KeyingMaterial, SRTP_EXPORTER_LABEL};
use crate::timer::Backoff;
use crate::{DtlsContext, DtlsRole, Error};

// Largest plaintext a single DTLS record can carry.
const MAX_RECORD_PAYLOAD: usize = 16384;

// OpenSSL's built-in DTLS timer. Not configurable through the openssl crate.
const OPENSSL_INITIAL_RTO: Duration = Duration::from_secs(1);
const OPENSSL_MAX_RTO: Duration = Duration::from_secs(60);

/// OpenSSL driven over in-memory datagram queues.
///
/// OpenSSL keeps its own retransmission timer (1s, doubled per retry, capped
/// at 60s) and resends the last flight when it is driven after that timer
/// expired. The openssl crate does not expose `DTLS_set_timer_cb`, so the
/// backoff here mirrors OpenSSL's policy to tell the agent when to drive it.
pub(crate) struct OsslEngine {
    tls: SslStream<IoBuffer>,
    handshake_complete: bool,
    /// Set once a handshake flight of ours is in the air.
    sent_any: bool,
    backoff: Backoff,
}

impl OsslEngine {
    pub fn new(context: &DtlsContext, role: DtlsRole) -> Result<Self, Error> {
        let config = context.config();

        let mut ssl = Ssl::new(context.ssl_context())?;
        ssl.set_mtu(config.mtu() as u32)?;

        match role {
            DtlsRole::Client => {
                // The server answers from what the context offers, i.e. every
                // profile we know. The client may narrow it down.
                ssl.set_tlsext_use_srtp(&offer_string(config.srtp_profiles()))?;
                ssl.set_connect_state();
            }
            DtlsRole::Server => ssl.set_accept_state(),
        }

        let tls = SslStream::new(ssl, IoBuffer::default())?;

        Ok(OsslEngine {
            tls,
            handshake_complete: false,
            sent_any: false,
            backoff: Backoff::new(OPENSSL_INITIAL_RTO, OPENSSL_MAX_RTO),
        })
    }

    fn step(&mut self) -> Result<Progress, Error> {
        if !self.handshake_complete {
            return match self.tls.do_handshake() {
                Ok(()) => {
                    self.handshake_complete = true;
                    Ok(Progress::HandshakeComplete)
                }
                Err(e) => map_error(e),
            };
        }

        let mut buf = vec![0; MAX_RECORD_PAYLOAD];
        match self.tls.ssl_read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(Progress::ApplicationData(buf))
            }
            Err(e) => map_error(e),
        }
    }

    fn outgoing_len(&self) -> usize {
        self.tls.get_ref().outgoing_len()
    }
}

fn map_error(e: ssl::Error) -> Result<Progress, Error> {
    match e.code() {
        ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Ok(Progress::Pending),
        ErrorCode::ZERO_RETURN => Ok(Progress::PeerClosed),
        _ => Err(Error::Protocol(e.to_string())),
    }
}

impl Engine for OsslEngine {
    fn push_incoming(&mut self, datagram: &[u8]) {
        self.tls.get_mut().push_incoming(datagram);
    }

    fn advance(&mut self) -> Result<Progress, Error> {
        let before = self.outgoing_len();
        let progress = self.step();

        // A reply to the peer starts a new flight.
        if self.outgoing_len() > before {
            self.sent_any = true;
            self.backoff.reset();
        }

        progress
    }

    fn handle_timeout(&mut self) -> Result<Progress, Error> {
        if self.handshake_complete {
            return Ok(Progress::Pending);
        }

        let before = self.outgoing_len();
        let progress = self.step();

        if self.outgoing_len() > before {
            self.backoff.attempt();
            debug!(
                "Flight resent, next retransmit in {:.03}s",
                self.backoff.rto().as_secs_f32()
            );
        }

        progress
    }

    fn pop_outgoing(&mut self) -> Option<Vec<u8>> {
        let datagram = self.tls.get_mut().pop_outgoing();
        if let Some(d) = &datagram {
            if d.len() > DATAGRAM_MTU_WARN {
                warn!("DTLS above MTU {}: {}", DATAGRAM_MTU_WARN, d.len());
            }
        }
        datagram
    }

    fn retransmit_timeout(&self) -> Option<Duration> {
        (!self.handshake_complete && self.sent_any).then(|| self.backoff.rto())
    }

    fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    fn peer_certificate(&self) -> Option<Vec<u8>> {
        self.tls.ssl().peer_certificate()?.to_der().ok()
    }

    fn selected_srtp_profile(&self) -> Option<String> {
        self.tls
            .ssl()
            .selected_srtp_profile()
            .map(|p| p.name().to_string())
    }

    fn export_keying_material(&self, len: usize) -> Result<KeyingMaterial, Error> {
        let mut buf = vec![0; len];
        self.tls
            .ssl()
            .export_keying_material(&mut buf, SRTP_EXPORTER_LABEL, None)
            .map_err(|e| Error::Protocol(format!("Keying material export failed: {}", e)))?;
        Ok(KeyingMaterial::new(buf))
    }

    fn write_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.tls
            .ssl_write(data)
            .map(|_| ())
            .map_err(|e| Error::Protocol(e.to_string()))
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.tls.shutdown() {
            trace!("Shutdown did not complete: {}", e);
        }
    }
}
