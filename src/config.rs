use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::srtp::SrtpProfile;
use crate::Error;

// Ephemeral (EC)DHE with AES-GCM or AES-256 only.
const DEFAULT_CIPHERS: &str = "ECDHE+AESGCM:DHE+AESGCM:ECDHE+AES256:DHE+AES256";

// Smallest MTU we accept. DTLS needs room for a record header plus a
// handshake fragment header.
const MIN_MTU: usize = 256;

const TEN_YEARS: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

/// Configuration of the process-wide [`DtlsContext`](crate::DtlsContext).
#[derive(Debug, Clone)]
pub struct Config {
    certificate_file: Option<PathBuf>,
    private_key_file: Option<PathBuf>,
    certificate_common_name: String,
    certificate_validity: Duration,
    mtu: usize,
    srtp_profiles: Vec<SrtpProfile>,
    cipher_list: String,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            certificate_file: None,
            private_key_file: None,
            certificate_common_name: "dtls-agent".to_string(),
            certificate_validity: TEN_YEARS,
            mtu: 1150,
            srtp_profiles: SrtpProfile::ALL.to_vec(),
            cipher_list: DEFAULT_CIPHERS.to_string(),
        }
    }

    /// PEM certificate and private key files, if both are configured.
    ///
    /// When this is `None` a self-signed certificate is generated.
    pub fn certificate_files(&self) -> Option<(&Path, &Path)> {
        match (&self.certificate_file, &self.private_key_file) {
            (Some(c), Some(k)) => Some((c.as_path(), k.as_path())),
            _ => None,
        }
    }

    /// Subject common name and organization of a generated certificate.
    #[inline(always)]
    pub fn certificate_common_name(&self) -> &str {
        &self.certificate_common_name
    }

    /// A generated certificate is valid this long before and after creation.
    #[inline(always)]
    pub fn certificate_validity(&self) -> Duration {
        self.certificate_validity
    }

    /// Max transmission unit.
    ///
    /// The largest size UDP packets we will produce.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// SRTP profiles offered by a client, most preferred first.
    #[inline(always)]
    pub fn srtp_profiles(&self) -> &[SrtpProfile] {
        &self.srtp_profiles
    }

    /// OpenSSL cipher list string.
    #[inline(always)]
    pub fn cipher_list(&self) -> &str {
        &self.cipher_list
    }
}

/// Builder for DTLS configuration.
pub struct ConfigBuilder {
    certificate_file: Option<PathBuf>,
    private_key_file: Option<PathBuf>,
    certificate_common_name: String,
    certificate_validity: Duration,
    mtu: usize,
    srtp_profiles: Vec<SrtpProfile>,
    cipher_list: String,
}

impl ConfigBuilder {
    /// Load the certificate and private key from PEM files instead of
    /// generating a self-signed pair.
    pub fn certificate_files(
        mut self,
        certificate: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        self.certificate_file = Some(certificate.into());
        self.private_key_file = Some(private_key.into());
        self
    }

    /// Set the subject name of generated certificates.
    ///
    /// Defaults to "dtls-agent".
    pub fn certificate_common_name(mut self, name: impl Into<String>) -> Self {
        self.certificate_common_name = name.into();
        self
    }

    /// Set how long a generated certificate is valid on either side of now.
    ///
    /// Defaults to 10 years.
    pub fn certificate_validity(mut self, validity: Duration) -> Self {
        self.certificate_validity = validity;
        self
    }

    /// Set the max transmission unit (MTU).
    ///
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the SRTP profiles a client offers, most preferred first.
    ///
    /// A server always offers every profile in [`SrtpProfile::ALL`].
    /// Defaults to [`SrtpProfile::ALL`].
    pub fn srtp_profiles(mut self, profiles: &[SrtpProfile]) -> Self {
        self.srtp_profiles = profiles.to_vec();
        self
    }

    /// Set the OpenSSL cipher list.
    pub fn cipher_list(mut self, ciphers: impl Into<String>) -> Self {
        self.cipher_list = ciphers.into();
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::Configuration` for values the engine cannot work with.
    pub fn build(self) -> Result<Config, Error> {
        if self.mtu < MIN_MTU {
            return Err(Error::Configuration(format!(
                "MTU {} is below the minimum of {}",
                self.mtu, MIN_MTU
            )));
        }

        if self.srtp_profiles.is_empty() {
            return Err(Error::Configuration(
                "At least one SRTP profile is required".to_string(),
            ));
        }

        Ok(Config {
            certificate_file: self.certificate_file,
            private_key_file: self.private_key_file,
            certificate_common_name: self.certificate_common_name,
            certificate_validity: self.certificate_validity,
            mtu: self.mtu,
            srtp_profiles: self.srtp_profiles,
            cipher_list: self.cipher_list,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            certificate_file: None,
            private_key_file: None,
            certificate_common_name: "dtls-agent".to_string(),
            certificate_validity: TEN_YEARS,
            mtu: 1150,
            srtp_profiles: SrtpProfile::ALL.to_vec(),
            cipher_list: DEFAULT_CIPHERS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.mtu(), 1150);
        assert_eq!(config.srtp_profiles(), SrtpProfile::ALL);
        assert!(config.certificate_files().is_none());
    }

    #[test]
    fn certificate_files_need_both_paths() {
        let config = Config::builder()
            .certificate_files("cert.pem", "key.pem")
            .build()
            .unwrap();
        let (c, k) = config.certificate_files().unwrap();
        assert_eq!(c, Path::new("cert.pem"));
        assert_eq!(k, Path::new("key.pem"));
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(Config::builder().mtu(100).build().is_err());
        assert!(Config::builder().srtp_profiles(&[]).build().is_err());
    }
}
