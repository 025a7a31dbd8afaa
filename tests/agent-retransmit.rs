//! Timer driven retransmission against the real engine.
//!
//! These tests sleep, since OpenSSL keeps its own wall clock timer.


use std::thread;
use std::time::{Duration, Instant};

use agent_common::*;
use dtls_agent::{DtlsRole, HandshakeState};

fn sleep_until(deadline: Instant) {
    // A little past the deadline so the engine's own timer has expired too.
    let target = deadline + Duration::from_millis(50);
    let now = Instant::now();
    if target > now {
        thread::sleep(target - now);
    }
}

#[test]
fn lost_client_hello_is_resent() {
    let _ = env_logger::try_init();

    let (mut server, mut client) = agent_pair();
    server.run(DtlsRole::Server).unwrap();
    client.run(DtlsRole::Client).unwrap();

    // Lose the first flight.
    let lost = std::mem::take(&mut client.listener_mut().outgoing);
    assert!(!lost.is_empty());

    let deadline = client.poll_timeout().expect("timer armed after first flight");
    // OpenSSL's own first timeout, there is no knob for it.
    assert!(deadline <= Instant::now() + Duration::from_secs(1));
    assert!(deadline > Instant::now() + Duration::from_millis(900));

    // Early calls are no-ops.
    client.handle_timeout(Instant::now());
    assert!(client.listener().outgoing.is_empty());

    sleep_until(deadline);
    client.handle_timeout(Instant::now());

    let resent = &client.listener().outgoing;
    assert!(!resent.is_empty(), "flight resent after timeout");
    assert!(resent.iter().all(|d| dtls_agent::is_dtls(d)));

    // Backoff doubled for the next attempt.
    let next = client.poll_timeout().expect("timer rearmed");
    assert!(next > Instant::now() + Duration::from_millis(1500));

    pump_until_quiet(&mut server, &mut client);
    assert!(server.is_connected());
    assert!(client.is_connected());
}

#[test]
fn lost_server_flight_is_resent() {
    let _ = env_logger::try_init();

    let (mut server, mut client) = agent_pair();
    server.run(DtlsRole::Server).unwrap();
    client.run(DtlsRole::Client).unwrap();

    pump(&mut client, &mut server);

    // The answer to the ClientHello never arrives.
    let lost = std::mem::take(&mut server.listener_mut().outgoing);
    assert!(!lost.is_empty());

    let deadline = server.poll_timeout().expect("server timer armed");
    sleep_until(deadline);
    server.handle_timeout(Instant::now());
    assert!(!server.listener().outgoing.is_empty());

    pump_until_quiet(&mut server, &mut client);
    assert_eq!(server.state(), HandshakeState::Connected);
    assert_eq!(client.state(), HandshakeState::Connected);
}

#[test]
fn idle_server_has_no_timer() {
    let _ = env_logger::try_init();

    let (mut server, _client) = agent_pair();
    server.run(DtlsRole::Server).unwrap();

    assert!(server.listener().outgoing.is_empty());
    assert_eq!(server.poll_timeout(), None);
}
