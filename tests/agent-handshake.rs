//! End-to-end handshakes between two in-process agents.


use agent_common::*;
use dtls_agent::{
    Config, DtlsRole, Fingerprint, Fingerprints, HandshakeState, HashAlgorithm, SrtpProfile,
};

#[test]
fn handshake_connects_with_swapped_keys() {
    let _ = env_logger::try_init();

    let (mut server, mut client) = agent_pair();
    handshake(&mut server, &mut client);

    assert_eq!(server.state(), HandshakeState::Connected);
    assert_eq!(client.state(), HandshakeState::Connected);
    assert_eq!(server.listener().connected, 1);
    assert_eq!(client.listener().connected, 1);
    assert!(server.listener().failures.is_empty());
    assert!(client.listener().failures.is_empty());

    let server_keys = &server.listener().keys;
    let client_keys = &client.listener().keys;
    assert_eq!(server_keys.len(), 1);
    assert_eq!(client_keys.len(), 1);

    let s = &server_keys[0];
    let c = &client_keys[0];
    assert_eq!(s.profile, c.profile);
    assert!(SrtpProfile::ALL.contains(&s.profile));

    assert_eq!(s.local, c.remote);
    assert_eq!(s.remote, c.local);
    assert_ne!(s.local, s.remote);

    assert_eq!(s.local.key().len(), s.profile.master_key_len());
    assert_eq!(s.local.salt().len(), s.profile.master_salt_len());

    // Nothing to retransmit once connected.
    assert_eq!(server.poll_timeout(), None);
    assert_eq!(client.poll_timeout(), None);
}

#[test]
fn client_narrows_srtp_profiles() {
    let _ = env_logger::try_init();

    let client_config = Config::builder()
        .srtp_profiles(&[SrtpProfile::Aes128CmSha1_80])
        .build()
        .unwrap();

    let (mut server, mut client) = agent_pair_with(context(), context_with(client_config));
    handshake(&mut server, &mut client);

    assert!(client.is_connected());
    assert_eq!(
        client.listener().keys[0].profile,
        SrtpProfile::Aes128CmSha1_80
    );
    assert_eq!(
        server.listener().keys[0].profile,
        SrtpProfile::Aes128CmSha1_80
    );
}

#[test]
fn every_hash_algorithm_verifies() {
    let _ = env_logger::try_init();

    for alg in HashAlgorithm::ALL {
        let server_ctx = context();
        let client_ctx = context();

        let (mut server, mut client) = agent_pair_with(server_ctx.clone(), client_ctx.clone());
        server.set_remote_fingerprint(client_ctx.fingerprints().get(*alg).cloned().unwrap());
        client.set_remote_fingerprint(server_ctx.fingerprints().get(*alg).cloned().unwrap());

        handshake(&mut server, &mut client);

        assert!(server.is_connected(), "server with {}", alg);
        assert!(client.is_connected(), "client with {}", alg);
    }
}

#[test]
fn fingerprint_from_session_description_is_case_insensitive() {
    let _ = env_logger::try_init();

    let server_ctx = context();
    let (mut server, mut client) = agent_pair_with(server_ctx.clone(), context());

    let sdp = server_ctx
        .fingerprints()
        .get(HashAlgorithm::Sha256)
        .unwrap()
        .to_string()
        .to_lowercase();
    let parsed: Fingerprint = sdp.parse().unwrap();
    client.set_remote_fingerprint(parsed);

    handshake(&mut server, &mut client);

    assert!(client.is_connected());
    assert!(server.is_connected());
}

#[test]
fn client_with_wrong_fingerprint_fails() {
    let _ = env_logger::try_init();

    let (mut server, mut client) = agent_pair();

    // Some other certificate's digest.
    let stranger = context();
    client.set_remote_fingerprint(
        stranger
            .fingerprints()
            .get(HashAlgorithm::Sha256)
            .cloned()
            .unwrap(),
    );

    handshake(&mut server, &mut client);

    assert_eq!(client.listener().failures.len(), 1);
    assert!(client.listener().failures[0].starts_with("FingerprintMismatch"));
    assert_eq!(client.listener().connected, 0);
    assert!(client.listener().keys.is_empty());
    assert_eq!(client.state(), HandshakeState::Closed);

    // The server may have completed first, but the client's close_notify
    // takes it down again.
    assert!(!(server.is_connected() && client.is_connected()));
    assert!(!server.is_connected());
}

#[test]
fn server_with_wrong_fingerprint_fails() {
    let _ = env_logger::try_init();

    let (mut server, mut client) = agent_pair();

    let stranger = context();
    server.set_remote_fingerprint(
        stranger
            .fingerprints()
            .get(HashAlgorithm::Sha256)
            .cloned()
            .unwrap(),
    );

    handshake(&mut server, &mut client);

    assert_eq!(server.listener().failures.len(), 1);
    assert_eq!(server.listener().connected, 0);
    assert!(server.listener().keys.is_empty());
    assert!(!server.is_connected());
    assert!(!client.is_connected());
}

#[test]
fn missing_remote_fingerprint_fails() {
    let _ = env_logger::try_init();

    let server_ctx = context();
    let client_ctx = context();

    let mut server = dtls_agent::DtlsAgent::new(server_ctx.clone(), Recorder::default());
    let mut client = dtls_agent::DtlsAgent::new(client_ctx, Recorder::default());
    client.set_remote_fingerprint(
        server_ctx
            .fingerprints()
            .get(HashAlgorithm::Sha256)
            .cloned()
            .unwrap(),
    );

    handshake(&mut server, &mut client);

    assert_eq!(server.listener().failures.len(), 1);
    assert!(server.listener().failures[0].starts_with("MissingRemoteFingerprint"));
    assert_eq!(server.listener().connected, 0);
}

#[test]
fn local_fingerprints_are_deterministic() {
    let ctx = context();

    let again = Fingerprints::compute(&ctx.certificate().certificate);
    assert_eq!(ctx.fingerprints().len(), HashAlgorithm::ALL.len());

    for (a, b) in ctx.fingerprints().iter().zip(again.iter()) {
        assert_eq!(a, b);
        assert_eq!(a.value(), b.value());
    }

    for alg in HashAlgorithm::ALL {
        assert_eq!(
            ctx.certificate().fingerprint(*alg),
            ctx.certificate().fingerprint(*alg)
        );
    }
}

#[test]
fn client_hello_is_classified_as_dtls() {
    let _ = env_logger::try_init();

    let (_server, mut client) = agent_pair();
    client.run(DtlsRole::Client).unwrap();

    let hello = &client.listener().outgoing[0];
    assert!(dtls_agent::is_dtls(hello));
    // Handshake content type.
    assert_eq!(hello[0], 22);
}
