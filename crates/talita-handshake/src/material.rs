//! Public key material exchanged over the optical channel.

use std::fmt;

use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use talita_core::KeyStrength;

use crate::fingerprint::Fingerprint;

/// Algorithm family of exchanged keys. Only RSA is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// `rsaEncryption`, OID 1.2.840.113549.1.1.1.
    Rsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
        }
    }
}

/// A validated public key: its canonical SubjectPublicKeyInfo DER bytes
/// together with the parsed key.
///
/// Only constructed from a freshly generated key or by the payload decoder,
/// so `der` is always a well-formed RSA SPKI of a supported size.
#[derive(Clone)]
pub struct PublicKeyMaterial {
    der: Vec<u8>,
    key: RsaPublicKey,
}

impl PublicKeyMaterial {
    pub(crate) const fn new(der: Vec<u8>, key: RsaPublicKey) -> Self {
        Self { der, key }
    }

    /// The SubjectPublicKeyInfo DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub const fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa
    }

    /// The parsed RSA key, for the messaging layer built on top.
    pub const fn rsa_public_key(&self) -> &RsaPublicKey {
        &self.key
    }

    pub fn modulus_bits(&self) -> usize {
        self.key.n().bits()
    }

    pub fn strength(&self) -> Option<KeyStrength> {
        KeyStrength::from_bits(self.modulus_bits())
    }

    /// SHA-256 fingerprint of the DER bytes.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl PartialEq for PublicKeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PublicKeyMaterial {}

// Key bytes stay out of logs; the fingerprint identifies the key.
impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyMaterial")
            .field("algorithm", &self.algorithm())
            .field("bits", &self.modulus_bits())
            .field("fingerprint", &self.fingerprint().to_string())
            .finish()
    }
}
