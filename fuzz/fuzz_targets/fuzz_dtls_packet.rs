#![no_main]

//! Fuzz target for agent datagram handling.
//!
//! Feeds arbitrary bytes to a server agent waiting for a ClientHello and to
//! a client agent that already sent one. Errors are expected, panics are not.

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;

use dtls_agent::{
    AgentControl, Config, DtlsAgent, DtlsContext, DtlsRole, Error, Listener, SrtpKeyMaterial,
};

struct Sink;

impl Listener for Sink {
    fn on_outgoing_dtls_data(&mut self, _data: &[u8]) {}
    fn on_dtls_connected(&mut self, _control: &mut AgentControl) {}
    fn on_dtls_disconnected(&mut self, _control: &mut AgentControl) {}
    fn on_dtls_failed(&mut self, _control: &mut AgentControl, _error: &Error) {}
    fn on_srtp_key_material(&mut self, _keys: &SrtpKeyMaterial) {}
    fn on_dtls_application_data(&mut self, _data: &[u8]) {}
}

// Certificate generation is slow, share one context across runs.
fn context() -> Option<Arc<DtlsContext>> {
    static CONTEXT: OnceLock<Option<Arc<DtlsContext>>> = OnceLock::new();
    CONTEXT
        .get_or_init(|| DtlsContext::new(Config::default()).ok())
        .clone()
}

fuzz_target!(|data: &[u8]| {
    let Some(context) = context() else {
        return;
    };

    let _ = dtls_agent::is_dtls(data);

    for role in [DtlsRole::Server, DtlsRole::Client] {
        let mut agent = DtlsAgent::new(Arc::clone(&context), Sink);
        if agent.run(role).is_err() {
            return;
        }
        agent.process_dtls_data(data);
        agent.close();
    }
});
