//! The local certificate: generation of a self-signed pair, or loading
//! one from PEM files.
//!
//! Peers identify each other by certificate fingerprint only, so the
//! certificate does not need to chain to anything. It is created once per
//! process and shared read-only by all agents through the
//! [`DtlsContext`](crate::DtlsContext).

use std::fmt;
use std::fs;
use std::path::Path;

use openssl::pkey::PKey;
use openssl::x509::X509;
use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};

use crate::fingerprint::{Fingerprint, HashAlgorithm};
use crate::{Config, Error};

/// Certificate and private key pair
#[derive(Clone)]
pub struct DtlsCertificate {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// Private key in PKCS#8 DER format
    pub private_key: Vec<u8>,
}

impl DtlsCertificate {
    /// Fingerprint of the certificate with the given hash function.
    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Fingerprint {
        Fingerprint::of(algorithm, &self.certificate)
    }
}

impl fmt::Debug for DtlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsCertificate")
            .field("certificate", &self.certificate.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

/// Generate a self-signed ECDSA P-256 certificate for DTLS.
pub fn generate_self_signed_certificate(config: &Config) -> Result<DtlsCertificate, Error> {
    let name = config.certificate_common_name();

    let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256)
        .map_err(|e| Error::Configuration(format!("Key generation failed: {}", e)))?;

    let mut params = CertificateParams::new(vec![name.to_string()]);
    params.alg = &PKCS_ECDSA_P256_SHA256;

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::OrganizationName, name.to_string());
    distinguished_name.push(DnType::CommonName, name.to_string());
    params.distinguished_name = distinguished_name;

    params.is_ca = IsCa::NoCa;
    params.key_pair = Some(key_pair);

    // Valid on both sides of now, so that peers with skewed clocks accept it.
    let validity = time::Duration::seconds(config.certificate_validity().as_secs() as i64);
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - validity;
    params.not_after = now + validity;

    let cert = RcgenCertificate::from_params(params)
        .map_err(|e| Error::Configuration(format!("Certificate generation failed: {}", e)))?;

    let certificate = cert
        .serialize_der()
        .map_err(|e| Error::Configuration(format!("Certificate serialization failed: {}", e)))?;
    let private_key = cert.serialize_private_key_der();

    Ok(DtlsCertificate {
        certificate,
        private_key,
    })
}

/// Read a PEM certificate and PEM private key from disk.
///
/// Fails unless the key is the one the certificate was issued for.
pub fn load_certificate_files(
    certificate_file: &Path,
    private_key_file: &Path,
) -> Result<DtlsCertificate, Error> {
    let cert_pem = fs::read(certificate_file).map_err(|e| {
        Error::Configuration(format!(
            "Error reading certificate file {}: {}",
            certificate_file.display(),
            e
        ))
    })?;
    let key_pem = fs::read(private_key_file).map_err(|e| {
        Error::Configuration(format!(
            "Error reading private key file {}: {}",
            private_key_file.display(),
            e
        ))
    })?;

    let x509 = X509::from_pem(&cert_pem)?;
    let pkey = PKey::private_key_from_pem(&key_pem)?;

    if !x509.public_key()?.public_eq(&pkey) {
        return Err(Error::Configuration(format!(
            "Private key {} does not match certificate {}",
            private_key_file.display(),
            certificate_file.display()
        )));
    }

    Ok(DtlsCertificate {
        certificate: x509.to_der()?,
        private_key: pkey.private_key_to_pkcs8()?,
    })
}

/// Obtain the process certificate as configured.
///
/// Both file paths set means load, anything else means generate.
pub(crate) fn obtain_certificate(config: &Config) -> Result<DtlsCertificate, Error> {
    match config.certificate_files() {
        Some((cert, key)) => {
            debug!("Loading DTLS certificate from {}", cert.display());
            load_certificate_files(cert, key)
        }
        None => {
            debug!("Generating self-signed DTLS certificate");
            generate_self_signed_certificate(config)
        }
    }
}
