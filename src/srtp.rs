//! SRTP protection profiles and DTLS-SRTP key extraction (RFC 5764).
use std::fmt;
use std::ops::Deref;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{DtlsRole, Error};

/// Exporter label for DTLS-SRTP keying material (RFC 5764 section 4.2).
pub const SRTP_EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Supported SRTP protection profiles.
pub enum SrtpProfile {
    /// AEAD_AES_256_GCM (RFC 7714)
    AeadAes256Gcm,
    /// AEAD_AES_128_GCM (RFC 7714)
    AeadAes128Gcm,
    /// SRTP_AES128_CM_HMAC_SHA1_80 (RFC 5764)
    Aes128CmSha1_80,
    /// SRTP_AES128_CM_HMAC_SHA1_32 (RFC 5764)
    Aes128CmSha1_32,
}

impl SrtpProfile {
    /// All supported profiles ordered by preference.
    pub const ALL: &'static [SrtpProfile] = &[
        SrtpProfile::AeadAes256Gcm,
        SrtpProfile::AeadAes128Gcm,
        SrtpProfile::Aes128CmSha1_80,
        SrtpProfile::Aes128CmSha1_32,
    ];

    /// Name used on the wire by the DTLS engine's `use_srtp` extension.
    pub fn wire_name(&self) -> &'static str {
        match self {
            SrtpProfile::AeadAes256Gcm => "SRTP_AEAD_AES_256_GCM",
            SrtpProfile::AeadAes128Gcm => "SRTP_AEAD_AES_128_GCM",
            SrtpProfile::Aes128CmSha1_80 => "SRTP_AES128_CM_SHA1_80",
            SrtpProfile::Aes128CmSha1_32 => "SRTP_AES128_CM_SHA1_32",
        }
    }

    /// Reverse lookup of a negotiated wire name.
    pub fn from_wire_name(name: &str) -> Option<SrtpProfile> {
        SrtpProfile::ALL
            .iter()
            .find(|p| p.wire_name() == name)
            .copied()
    }

    /// Master key length in bytes.
    pub fn master_key_len(&self) -> usize {
        match self {
            SrtpProfile::AeadAes256Gcm => 32,
            SrtpProfile::AeadAes128Gcm => 16,
            SrtpProfile::Aes128CmSha1_80 | SrtpProfile::Aes128CmSha1_32 => 16,
        }
    }

    /// Master salt length in bytes.
    pub fn master_salt_len(&self) -> usize {
        match self {
            SrtpProfile::AeadAes256Gcm | SrtpProfile::AeadAes128Gcm => 12,
            SrtpProfile::Aes128CmSha1_80 | SrtpProfile::Aes128CmSha1_32 => 14,
        }
    }

    /// The length of keying material to extract from the DTLS session in bytes.
    pub fn keying_material_len(&self) -> usize {
        // MASTER_KEY_LEN * 2 + MASTER_SALT * 2
        (self.master_key_len() + self.master_salt_len()) * 2
    }
}

impl fmt::Display for SrtpProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Colon separated list of wire names, as the engine expects the offer.
pub fn offer_string(profiles: &[SrtpProfile]) -> String {
    profiles
        .iter()
        .map(|p| p.wire_name())
        .collect::<Vec<_>>()
        .join(":")
}

/// Keying material exported from the DTLS session.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyingMaterial(Vec<u8>);

impl KeyingMaterial {
    /// Create a new wrapper for DTLS-SRTP keying material bytes.
    pub fn new(m: Vec<u8>) -> Self {
        KeyingMaterial(m)
    }
}

impl Deref for KeyingMaterial {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for KeyingMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyingMaterial")
    }
}

/// One direction's SRTP master key and salt.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SrtpKey {
    key: Vec<u8>,
    salt: Vec<u8>,
}

impl SrtpKey {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Key followed by salt, the layout SRTP libraries take as "master key".
    pub fn master(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.key.len() + self.salt.len());
        v.extend_from_slice(&self.key);
        v.extend_from_slice(&self.salt);
        v
    }
}

impl fmt::Debug for SrtpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpKey")
            .field("key", &self.key.len())
            .field("salt", &self.salt.len())
            .finish()
    }
}

/// SRTP keys of a completed handshake, seen from one agent.
///
/// `local` protects what this side sends, `remote` what it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtpKeyMaterial {
    pub profile: SrtpProfile,
    pub local: SrtpKey,
    pub remote: SrtpKey,
}

impl SrtpKeyMaterial {
    /// Split exported material into local and remote keys for `role`.
    ///
    /// The exporter output is laid out as
    /// `client_key | server_key | client_salt | server_salt`.
    pub fn split(
        profile: SrtpProfile,
        material: &KeyingMaterial,
        role: DtlsRole,
    ) -> Result<Self, Error> {
        if material.len() != profile.keying_material_len() {
            return Err(Error::Protocol(format!(
                "Keying material for {} must be {} bytes, got {}",
                profile,
                profile.keying_material_len(),
                material.len()
            )));
        }

        let key_len = profile.master_key_len();
        let salt_len = profile.master_salt_len();

        let (client_key, rest) = material.split_at(key_len);
        let (server_key, rest) = rest.split_at(key_len);
        let (client_salt, server_salt) = rest.split_at(salt_len);

        let client = SrtpKey {
            key: client_key.to_vec(),
            salt: client_salt.to_vec(),
        };
        let server = SrtpKey {
            key: server_key.to_vec(),
            salt: server_salt.to_vec(),
        };

        let (local, remote) = match role {
            DtlsRole::Client => (client, server),
            DtlsRole::Server => (server, client),
        };

        Ok(SrtpKeyMaterial {
            profile,
            local,
            remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_map_back() {
        for p in SrtpProfile::ALL {
            assert_eq!(SrtpProfile::from_wire_name(p.wire_name()), Some(*p));
        }
        assert_eq!(SrtpProfile::from_wire_name("SRTP_NULL_SHA1_80"), None);
    }

    #[test]
    fn offer_keeps_preference_order() {
        assert_eq!(
            offer_string(SrtpProfile::ALL),
            "SRTP_AEAD_AES_256_GCM:SRTP_AEAD_AES_128_GCM:\
             SRTP_AES128_CM_SHA1_80:SRTP_AES128_CM_SHA1_32"
        );
        assert_eq!(
            offer_string(&[SrtpProfile::Aes128CmSha1_80]),
            "SRTP_AES128_CM_SHA1_80"
        );
    }

    #[test]
    fn keying_material_lengths() {
        assert_eq!(SrtpProfile::Aes128CmSha1_80.keying_material_len(), 60);
        assert_eq!(SrtpProfile::Aes128CmSha1_32.keying_material_len(), 60);
        assert_eq!(SrtpProfile::AeadAes128Gcm.keying_material_len(), 56);
        assert_eq!(SrtpProfile::AeadAes256Gcm.keying_material_len(), 88);
    }

    #[test]
    fn split_is_role_swapped() {
        let profile = SrtpProfile::Aes128CmSha1_80;
        let bytes: Vec<u8> = (0..profile.keying_material_len() as u8).collect();
        let material = KeyingMaterial::new(bytes);

        let client = SrtpKeyMaterial::split(profile, &material, DtlsRole::Client).unwrap();
        let server = SrtpKeyMaterial::split(profile, &material, DtlsRole::Server).unwrap();

        assert_eq!(client.local, server.remote);
        assert_eq!(client.remote, server.local);

        // client_key | server_key | client_salt | server_salt
        assert_eq!(client.local.key(), &(0..16).collect::<Vec<u8>>()[..]);
        assert_eq!(client.remote.key(), &(16..32).collect::<Vec<u8>>()[..]);
        assert_eq!(client.local.salt(), &(32..46).collect::<Vec<u8>>()[..]);
        assert_eq!(client.remote.salt(), &(46..60).collect::<Vec<u8>>()[..]);
        assert_eq!(client.local.master().len(), 30);
    }

    #[test]
    fn split_rejects_wrong_length() {
        let material = KeyingMaterial::new(vec![0; 10]);
        let r = SrtpKeyMaterial::split(SrtpProfile::AeadAes128Gcm, &material, DtlsRole::Client);
        assert!(matches!(r, Err(Error::Protocol(_))));
    }
}
