//! DTLS-SRTP handshake agent for real-time media endpoints.
//!
//! Negotiates a DTLS session over an unreliable datagram transport, verifies
//! the peer by certificate fingerprint (no PKI chain), and derives the SRTP
//! master keys for the media session. The crate is Sans-IO: it never opens
//! sockets or sleeps. Datagrams go in through
//! [`DtlsAgent::process_dtls_data`], come out through
//! [`Listener::on_outgoing_dtls_data`], and retransmission is driven by the
//! caller via [`DtlsAgent::poll_timeout`] / [`DtlsAgent::handle_timeout`].
//!
//! ## Handshake flow (DTLS 1.2 with use_srtp)
//!
//! ```text
//! Client                                               Server
//!
//! 1     ClientHello                  -------->
//!       + use_srtp
//!
//! 2                                                      ServerHello
//!                                                        + use_srtp
//!                                                        Certificate
//!                                                  ServerKeyExchange
//!                                                 CertificateRequest
//!                                    <--------       ServerHelloDone
//!
//! 3     Certificate
//!       ClientKeyExchange
//!       CertificateVerify
//!       [ChangeCipherSpec]
//!       Finished                     -------->
//!
//! 4                                               [ChangeCipherSpec]
//!                                    <--------              Finished
//!
//!       Fingerprint check, SRTP key export
//!
//!       Application Data             <------->      Application Data
//! ```
//!
//! Each numbered flight is retransmitted as a unit when the peer's answer
//! does not arrive in time.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Instant;
//!
//! use dtls_agent::{
//!     AgentControl, Config, DtlsAgent, DtlsContext, DtlsRole, Error, Fingerprint, Listener,
//!     SrtpKeyMaterial,
//! };
//!
//! struct Transport;
//!
//! impl Listener for Transport {
//!     fn on_outgoing_dtls_data(&mut self, data: &[u8]) {
//!         // socket.send(data)
//!     }
//!     fn on_dtls_connected(&mut self, _control: &mut AgentControl) {}
//!     fn on_dtls_disconnected(&mut self, _control: &mut AgentControl) {}
//!     fn on_dtls_failed(&mut self, control: &mut AgentControl, error: &Error) {
//!         eprintln!("DTLS failed: {}", error);
//!         control.reset();
//!     }
//!     fn on_srtp_key_material(&mut self, keys: &SrtpKeyMaterial) {
//!         // srtp_session.install(keys.profile, keys.local.master(), keys.remote.master())
//!     }
//!     fn on_dtls_application_data(&mut self, _data: &[u8]) {}
//! }
//!
//! fn main() -> Result<(), Error> {
//!     // Once per process.
//!     let context = DtlsContext::new(Config::default())?;
//!
//!     // Goes into the session description.
//!     for fp in context.fingerprints() {
//!         println!("a=fingerprint:{}", fp);
//!     }
//!
//!     let mut agent = DtlsAgent::new(context.clone(), Transport);
//!     agent.set_remote_fingerprint("sha-256 AB:CD:...".parse()?);
//!     agent.run(DtlsRole::Client)?;
//!
//!     loop {
//!         // Feed datagrams that pass `dtls_agent::is_dtls`.
//!         # let datagram: &[u8] = &[];
//!         agent.process_dtls_data(datagram);
//!
//!         if let Some(deadline) = agent.poll_timeout() {
//!             // wait until deadline, or the next datagram
//!             agent.handle_timeout(Instant::now());
//!         }
//!         # break;
//!     }
//!
//!     agent.close();
//!     drop(agent);
//!     context.teardown()
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod agent;
pub use agent::{AgentControl, DtlsAgent, DtlsRole, HandshakeState, Listener};

mod certificate;
pub use certificate::{generate_self_signed_certificate, load_certificate_files, DtlsCertificate};

mod config;
pub use config::{Config, ConfigBuilder};

mod context;
pub use context::DtlsContext;

mod detect;
pub use detect::is_dtls;

mod engine;

mod error;
pub use error::Error;

mod fingerprint;
pub use fingerprint::{Fingerprint, Fingerprints, HashAlgorithm};

mod srtp;
pub use srtp::{KeyingMaterial, SrtpKey, SrtpKeyMaterial, SrtpProfile, SRTP_EXPORTER_LABEL};

mod timer;
