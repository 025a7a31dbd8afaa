//! The per-connection DTLS agent.
//!
//! A [`DtlsAgent`] owns one engine and one retransmission timer, drives the
//! handshake, verifies the peer fingerprint, extracts SRTP keys and reports
//! the outcome to its [`Listener`].
//!
//! Notifications are queued while the agent changes state and delivered once
//! it is consistent again. The listener cannot reach the agent while it is
//! being called, except through [`AgentControl`] in lifecycle callbacks,
//! where a reset or close is only recorded and carried out after every
//! queued notification has been delivered.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{Engine, OsslEngine, Progress};
use crate::fingerprint::Fingerprint;
use crate::srtp::{SrtpKeyMaterial, SrtpProfile};
use crate::timer::RetransmitTimer;
use crate::{DtlsContext, Error};

/// Which side of the handshake an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtlsRole {
    /// Waits for the ClientHello.
    Server,
    /// Sends the first flight.
    Client,
}

/// Lifecycle of a [`DtlsAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// No engine bound.
    Idle,
    /// Handshake in progress.
    Running,
    /// Handshake complete and the peer verified.
    Connected,
    /// Failed, disconnected or closed. `reset` brings it back to Idle,
    /// unless the agent was closed.
    Closed,
}

/// Receiver of everything a [`DtlsAgent`] produces.
pub trait Listener {
    /// Bytes to transmit to the peer, unmodified and in this order.
    fn on_outgoing_dtls_data(&mut self, data: &[u8]);

    /// The handshake completed and the peer fingerprint matched.
    fn on_dtls_connected(&mut self, control: &mut AgentControl);

    /// The peer closed the session, or it broke after being connected.
    fn on_dtls_disconnected(&mut self, control: &mut AgentControl);

    /// The handshake failed. Nothing else follows until `reset` and `run`.
    fn on_dtls_failed(&mut self, control: &mut AgentControl, error: &Error);

    /// SRTP keys of the completed handshake. Delivered once, right after
    /// [`Listener::on_dtls_connected`].
    fn on_srtp_key_material(&mut self, keys: &SrtpKeyMaterial);

    /// Decrypted application data.
    fn on_dtls_application_data(&mut self, data: &[u8]);
}

/// Handle given to lifecycle callbacks.
///
/// Requests are deferred until every notification of the current operation
/// has been delivered. When both are requested, close wins.
#[derive(Debug)]
pub struct AgentControl {
    state: HandshakeState,
    request: Option<Request>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Reset,
    Close,
}

impl AgentControl {
    /// State of the agent after the operation that caused the callback.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Ask for [`DtlsAgent::reset`] once the current callbacks are done.
    pub fn reset(&mut self) {
        if self.request.is_none() {
            self.request = Some(Request::Reset);
        }
    }

    /// Ask for [`DtlsAgent::close`] once the current callbacks are done.
    pub fn close(&mut self) {
        self.request = Some(Request::Close);
    }
}

#[derive(Debug)]
enum Event {
    Outgoing(Vec<u8>),
    Connected,
    Disconnected,
    Failed(Error),
    SrtpKeyMaterial(SrtpKeyMaterial),
    ApplicationData(Vec<u8>),
}

#[derive(Clone, Copy)]
enum Input<'a> {
    Start,
    Datagram(&'a [u8]),
    Timeout,
}

/// DTLS handshake orchestrator for one connection.
pub struct DtlsAgent<L: Listener> {
    context: Arc<DtlsContext>,
    listener: L,
    engine: Option<Box<dyn Engine>>,
    timer: RetransmitTimer,
    state: HandshakeState,
    role: Option<DtlsRole>,
    remote_fingerprint: Option<Fingerprint>,
    events: VecDeque<Event>,
    /// Closed for good, see [`DtlsAgent::close`].
    terminated: bool,
}

impl<L: Listener> DtlsAgent<L> {
    pub fn new(context: Arc<DtlsContext>, listener: L) -> Self {
        DtlsAgent {
            context,
            listener,
            engine: None,
            timer: RetransmitTimer::default(),
            state: HandshakeState::Idle,
            role: None,
            remote_fingerprint: None,
            events: VecDeque::new(),
            terminated: false,
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn context(&self) -> &Arc<DtlsContext> {
        &self.context
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Role of the last `run`. Kept across `reset`.
    pub fn role(&self) -> Option<DtlsRole> {
        self.role
    }

    /// Running or connected.
    pub fn is_running(&self) -> bool {
        matches!(self.state, HandshakeState::Running | HandshakeState::Connected)
    }

    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    pub fn remote_fingerprint(&self) -> Option<&Fingerprint> {
        self.remote_fingerprint.as_ref()
    }

    /// When [`DtlsAgent::handle_timeout`] should be called next.
    ///
    /// `None` while there is nothing to retransmit. The deadline is always
    /// on the real clock, since OpenSSL retransmits on its own wall-clock
    /// timer. Driving the agent with simulated time does not move it.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Start the handshake in the given role.
    ///
    /// Only possible from [`HandshakeState::Idle`], anything else is
    /// [`Error::InvalidState`]. A client sends its first flight before this
    /// returns.
    pub fn run(&mut self, role: DtlsRole) -> Result<(), Error> {
        self.ensure_idle()?;
        let engine = OsslEngine::new(&self.context, role)?;
        self.start(role, Box::new(engine));
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn run_with_engine(
        &mut self,
        role: DtlsRole,
        engine: Box<dyn Engine>,
    ) -> Result<(), Error> {
        self.ensure_idle()?;
        self.start(role, engine);
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.terminated {
            return Err(Error::InvalidState("cannot run a closed agent".to_string()));
        }
        if self.state != HandshakeState::Idle {
            return Err(Error::InvalidState(format!("cannot run while {:?}", self.state)));
        }
        Ok(())
    }

    fn start(&mut self, role: DtlsRole, engine: Box<dyn Engine>) {
        debug!("Run DTLS as {:?}", role);

        self.role = Some(role);
        self.engine = Some(engine);
        self.state = HandshakeState::Running;

        self.drive(Input::Start);
        self.dispatch();
    }

    /// Set the fingerprint the peer's certificate must match.
    ///
    /// Replaces any earlier value. The value stored when the handshake
    /// completes is the one that counts.
    pub fn set_remote_fingerprint(&mut self, fingerprint: Fingerprint) {
        debug!("Remote fingerprint {}", fingerprint);
        self.remote_fingerprint = Some(fingerprint);
    }

    /// Feed one datagram received from the peer.
    ///
    /// Ignored unless the agent is running or connected.
    pub fn process_dtls_data(&mut self, data: &[u8]) {
        if !self.is_running() {
            warn!(
                "Ignoring {} bytes of DTLS data while {:?}",
                data.len(),
                self.state
            );
            return;
        }

        trace!("Process DTLS data: {}", data.len());

        self.drive(Input::Datagram(data));
        self.dispatch();
    }

    /// Drive retransmission.
    ///
    /// Does nothing unless the deadline from [`DtlsAgent::poll_timeout`]
    /// has passed. `now` is only compared against that deadline, the next
    /// one is armed from [`Instant::now`].
    pub fn handle_timeout(&mut self, now: Instant) {
        if !self.timer.is_expired(now) {
            return;
        }
        self.timer.disarm();

        if self.state != HandshakeState::Running {
            return;
        }

        trace!("Retransmission timer fired");

        self.drive(Input::Timeout);
        self.dispatch();
    }

    /// Encrypt and send application data.
    ///
    /// Fails with [`Error::NotConnected`] unless connected, without sending
    /// anything. An empty payload is accepted and ignored.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != HandshakeState::Connected {
            return Err(Error::NotConnected);
        }

        if data.is_empty() {
            return Ok(());
        }

        let Some(engine) = self.engine.as_mut() else {
            return Err(Error::NotConnected);
        };

        let result = engine.write_application_data(data);
        self.drain_outgoing();

        if let Err(e) = result {
            error!("Failed to send application data: {}", e);
            self.end_session(e);
        }

        self.dispatch();
        Ok(())
    }

    /// Tear down the current session and go back to Idle.
    ///
    /// Sends close_notify if a session exists. Role and remote fingerprint
    /// are kept so `run` can be called again. Does nothing on a closed agent.
    pub fn reset(&mut self) {
        self.do_reset();
        self.dispatch();
    }

    /// Tear down for good. Later calls to `run` fail.
    pub fn close(&mut self) {
        self.do_close();
        self.dispatch();
    }

    /// Log the agent's state for diagnostics.
    pub fn dump(&self) {
        debug!("<DtlsAgent>");
        debug!("  role: {:?}", self.role);
        debug!("  state: {:?}", self.state);
        match &self.engine {
            Some(engine) => debug!(
                "  engine bound, handshake complete: {}",
                engine.is_handshake_complete()
            ),
            None => debug!("  no engine bound"),
        }
        match &self.remote_fingerprint {
            Some(fp) => debug!("  remote fingerprint: {}", fp),
            None => debug!("  remote fingerprint: none"),
        }
        debug!("  next timeout: {:?}", self.timer.deadline());
        debug!("</DtlsAgent>");
    }

    fn do_reset(&mut self) {
        if self.terminated {
            return;
        }
        if self.state != HandshakeState::Idle {
            debug!("Reset DTLS agent ({:?})", self.state);
        }

        self.teardown();
        self.state = HandshakeState::Idle;
    }

    fn do_close(&mut self) {
        if self.terminated {
            return;
        }
        debug!("Close DTLS agent ({:?})", self.state);

        self.teardown();
        self.terminated = true;
        self.state = HandshakeState::Closed;
    }

    /// Stop the timer and release the engine, sending close_notify first.
    fn teardown(&mut self) {
        self.timer.disarm();

        if let Some(mut engine) = self.engine.take() {
            engine.shutdown();
            while let Some(d) = engine.pop_outgoing() {
                self.events.push_back(Event::Outgoing(d));
            }
        }
    }

    fn drive(&mut self, input: Input<'_>) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        if let Input::Datagram(data) = input {
            engine.push_incoming(data);
        }

        let mut timed_out = matches!(input, Input::Timeout);
        let mut produced = false;

        loop {
            let Some(engine) = self.engine.as_mut() else {
                return;
            };

            let result = if timed_out {
                timed_out = false;
                engine.handle_timeout()
            } else {
                engine.advance()
            };

            produced |= self.drain_outgoing();

            match result {
                Ok(Progress::Pending) => break,

                Ok(Progress::HandshakeComplete) => {
                    if let Err(e) = self.complete_handshake() {
                        self.fail(e);
                        return;
                    }
                }

                Ok(Progress::ApplicationData(data)) => {
                    if self.state == HandshakeState::Connected {
                        self.events.push_back(Event::ApplicationData(data));
                    } else {
                        warn!(
                            "Dropping {} bytes of application data received before connected",
                            data.len()
                        );
                    }
                }

                Ok(Progress::PeerClosed) => {
                    debug!("Peer closed DTLS while {:?}", self.state);
                    self.end_session(Error::Protocol("Closed by peer".to_string()));
                    return;
                }

                Err(e) => {
                    self.end_session(e);
                    return;
                }
            }
        }

        self.rearm_timer(produced);
    }

    /// Keep exactly one deadline armed while the handshake runs.
    ///
    /// A new flight restarts the timer. Input that produced nothing leaves a
    /// running deadline untouched. The deadline is taken from the clock after
    /// the engine ran, so it never precedes the engine's own timer.
    fn rearm_timer(&mut self, new_flight: bool) {
        let rto = match (&self.engine, self.state) {
            (Some(engine), HandshakeState::Running) => engine.retransmit_timeout(),
            _ => None,
        };

        let Some(rto) = rto else {
            if self.timer.deadline().is_some() {
                trace!("Retransmission timer disarmed");
            }
            self.timer.disarm();
            return;
        };

        if new_flight || self.timer.deadline().is_none() {
            trace!("Retransmission timer armed: {:.03}s", rto.as_secs_f32());
            self.timer.arm(Instant::now(), rto);
        }
    }

    fn drain_outgoing(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let mut any = false;
        while let Some(d) = engine.pop_outgoing() {
            trace!("Outgoing DTLS data: {}", d.len());
            self.events.push_back(Event::Outgoing(d));
            any = true;
        }
        any
    }

    /// Verify the peer and extract SRTP keys.
    fn complete_handshake(&mut self) -> Result<(), Error> {
        self.timer.disarm();

        let (Some(engine), Some(role)) = (self.engine.as_ref(), self.role) else {
            return Err(Error::InvalidState(
                "handshake completed without a session".to_string(),
            ));
        };

        let expected = self
            .remote_fingerprint
            .as_ref()
            .ok_or(Error::MissingRemoteFingerprint)?;
        let peer_certificate = engine
            .peer_certificate()
            .ok_or(Error::MissingPeerCertificate)?;
        expected.verify(&peer_certificate)?;

        let name = engine
            .selected_srtp_profile()
            .ok_or_else(|| Error::UnsupportedCipherSuite("none negotiated".to_string()))?;
        let Some(profile) = SrtpProfile::from_wire_name(&name) else {
            return Err(Error::UnsupportedCipherSuite(name));
        };

        let material = engine.export_keying_material(profile.keying_material_len())?;
        let keys = SrtpKeyMaterial::split(profile, &material, role)?;

        debug!("DTLS connected as {:?}, SRTP profile {}", role, profile);

        self.state = HandshakeState::Connected;
        self.events.push_back(Event::Connected);
        self.events.push_back(Event::SrtpKeyMaterial(keys));

        Ok(())
    }

    /// Handshake-time failure. Notifies the peer and closes the session.
    fn fail(&mut self, error: Error) {
        error!("DTLS failed: {}", error);
        self.teardown();
        self.state = HandshakeState::Closed;
        self.events.push_back(Event::Failed(error));
    }

    /// The engine gave up or the peer closed.
    ///
    /// A connected session is disconnected, anything earlier has failed.
    fn end_session(&mut self, error: Error) {
        if self.state == HandshakeState::Connected {
            debug!("DTLS disconnected: {}", error);
            self.teardown();
            self.state = HandshakeState::Closed;
            self.events.push_back(Event::Disconnected);
        } else {
            self.fail(error);
        }
    }

    /// Deliver queued notifications, then carry out deferred requests.
    fn dispatch(&mut self) {
        loop {
            let mut control = AgentControl {
                state: self.state,
                request: None,
            };

            while let Some(event) = self.events.pop_front() {
                match event {
                    Event::Outgoing(d) => self.listener.on_outgoing_dtls_data(&d),
                    Event::Connected => self.listener.on_dtls_connected(&mut control),
                    Event::Disconnected => self.listener.on_dtls_disconnected(&mut control),
                    Event::Failed(e) => self.listener.on_dtls_failed(&mut control, &e),
                    Event::SrtpKeyMaterial(k) => self.listener.on_srtp_key_material(&k),
                    Event::ApplicationData(d) => self.listener.on_dtls_application_data(&d),
                }
            }

            match control.request {
                None => return,
                Some(Request::Reset) => self.do_reset(),
                Some(Request::Close) => self.do_close(),
            }
        }
    }
}
