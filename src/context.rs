use std::fmt;
use std::sync::Arc;

use openssl::dh::Dh;
use openssl::pkey::PKey;
use openssl::ssl::{
    SslContext, SslContextBuilder, SslMethod, SslOptions, SslSessionCacheMode, SslVerifyMode,
};
use openssl::x509::X509;

use crate::certificate::{obtain_certificate, DtlsCertificate};
use crate::fingerprint::Fingerprints;
use crate::srtp::{offer_string, SrtpProfile};
use crate::{Config, Error};

/// Process-wide DTLS identity shared by every agent.
///
/// Holds the local certificate and key, the engine context built from them
/// and the certificate's fingerprints. Immutable after [`DtlsContext::new`],
/// so it is shared as `Arc<DtlsContext>` without locking.
///
/// Lifecycle is two-phase: build it once before creating agents, and call
/// [`DtlsContext::teardown`] after the last agent is gone.
pub struct DtlsContext {
    config: Config,
    certificate: DtlsCertificate,
    fingerprints: Fingerprints,
    ssl_context: SslContext,
}

impl DtlsContext {
    /// Obtain the certificate, set up the engine context and compute the
    /// local fingerprints.
    ///
    /// Any failure is a configuration error and the endpoint cannot start.
    pub fn new(config: Config) -> Result<Arc<DtlsContext>, Error> {
        let certificate = obtain_certificate(&config)?;
        DtlsContext::with_certificate(config, certificate)
    }

    /// Like [`DtlsContext::new`], but with an already obtained certificate.
    pub fn with_certificate(
        config: Config,
        certificate: DtlsCertificate,
    ) -> Result<Arc<DtlsContext>, Error> {
        let ssl_context = create_ssl_context(&config, &certificate)?;
        let fingerprints = Fingerprints::compute(&certificate.certificate);

        for fp in &fingerprints {
            debug!("Local fingerprint {}", fp);
        }

        Ok(Arc::new(DtlsContext {
            config,
            certificate,
            fingerprints,
            ssl_context,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn certificate(&self) -> &DtlsCertificate {
        &self.certificate
    }

    /// Fingerprints of the local certificate, for the session description.
    pub fn fingerprints(&self) -> &Fingerprints {
        &self.fingerprints
    }

    pub(crate) fn ssl_context(&self) -> &SslContext {
        &self.ssl_context
    }

    /// Release the certificate, key and engine context.
    ///
    /// Fails with [`Error::InvalidState`] while any agent (or other clone)
    /// still holds the context.
    pub fn teardown(self: Arc<Self>) -> Result<(), Error> {
        match Arc::try_unwrap(self) {
            Ok(context) => {
                debug!("DTLS context torn down");
                drop(context);
                Ok(())
            }
            Err(context) => Err(Error::InvalidState(format!(
                "context still held by {} other owner(s)",
                Arc::strong_count(&context) - 1
            ))),
        }
    }
}

impl fmt::Debug for DtlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsContext")
            .field("certificate", &self.certificate)
            .field("fingerprints", &self.fingerprints)
            .finish()
    }
}

fn create_ssl_context(config: &Config, cert: &DtlsCertificate) -> Result<SslContext, Error> {
    let x509 = X509::from_der(&cert.certificate)?;
    let pkey = PKey::private_key_from_pkcs8(&cert.private_key)?;

    let mut ctx = SslContextBuilder::new(SslMethod::dtls())?;

    ctx.set_certificate(&x509)?;
    ctx.set_private_key(&pkey)?;
    ctx.check_private_key()?;

    ctx.set_cipher_list(config.cipher_list())?;

    // Servers offer every profile we know. Clients narrow this down per
    // session to the configured list.
    ctx.set_tlsext_use_srtp(&offer_string(SrtpProfile::ALL))?;

    // The peer must present a certificate, but any certificate is accepted
    // here. Trust comes from the fingerprint check after the handshake.
    let mut mode = SslVerifyMode::empty();
    mode.insert(SslVerifyMode::PEER);
    mode.insert(SslVerifyMode::FAIL_IF_NO_PEER_CERT);
    ctx.set_verify_callback(mode, |_ok, _ctx| true);

    let mut options = SslOptions::empty();
    options.insert(SslOptions::CIPHER_SERVER_PREFERENCE);
    options.insert(SslOptions::NO_TICKET);
    options.insert(SslOptions::SINGLE_ECDH_USE);
    options.insert(SslOptions::NO_DTLSV1);
    ctx.set_options(options);

    ctx.set_session_cache_mode(SslSessionCacheMode::OFF);

    // Enable DHE cipher suites by setting temporary DH parameters
    if let Ok(dh) = Dh::get_2048_256() {
        ctx.set_tmp_dh(&dh)?;
    }

    Ok(ctx.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::HashAlgorithm;

    #[test]
    fn fingerprints_cover_every_algorithm() {
        let context = DtlsContext::new(Config::default()).unwrap();
        let fps = context.fingerprints();

        assert_eq!(fps.len(), HashAlgorithm::ALL.len());
        for (fp, alg) in fps.iter().zip(HashAlgorithm::ALL) {
            assert_eq!(fp.algorithm(), *alg);
            assert_eq!(*fp, context.certificate().fingerprint(*alg));
        }
    }

    #[test]
    fn teardown_waits_for_last_holder() {
        let context = DtlsContext::new(Config::default()).unwrap();
        let held = Arc::clone(&context);

        assert!(matches!(
            Arc::clone(&context).teardown(),
            Err(Error::InvalidState(_))
        ));

        drop(held);
        assert!(context.teardown().is_ok());
    }
}
