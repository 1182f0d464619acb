//! Key fingerprints.
//!
//! A fingerprint is the SHA-256 digest of a key's SubjectPublicKeyInfo DER
//! bytes, shown as 64 lowercase hex characters. It is never truncated: the
//! full digest is what two people read out to each other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::HandshakeError;
use crate::material::PublicKeyMaterial;

/// Digest length in bytes.
pub const FINGERPRINT_LEN: usize = 32;
/// Length of the hex rendering.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_LEN * 2;

/// SHA-256 fingerprint of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint of validated key material.
    pub fn of(material: &PublicKeyMaterial) -> Self {
        Self::of_der(material.as_der())
    }

    pub(crate) fn of_der(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    /// The raw digest.
    pub const fn digest(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Compare against a fingerprint supplied by a peer or user in
    /// constant time.
    pub fn matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Sixteen groups of four hex characters, four groups per line, for
    /// reading aloud.
    pub fn grouped(&self) -> String {
        let hex = self.to_string();
        let groups: Vec<&str> = hex
            .as_bytes()
            .chunks(4)
            .filter_map(|c| std::str::from_utf8(c).ok())
            .collect();
        groups
            .chunks(4)
            .map(|line| line.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Derive the fingerprint of `material`.
pub fn fingerprint(material: &PublicKeyMaterial) -> Fingerprint {
    Fingerprint::of(material)
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Accepts the plain form plus the colon- and space-separated forms people
/// copy from other tools, in either case.
impl FromStr for Fingerprint {
    type Err = HandshakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '\n' | '\t'))
            .collect();
        if compact.len() != FINGERPRINT_HEX_LEN {
            return Err(HandshakeError::InvalidFingerprint(format!(
                "expected {FINGERPRINT_HEX_LEN} hex digits, got {}",
                compact.len()
            )));
        }
        let mut digest = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(compact.to_ascii_lowercase(), &mut digest)
            .map_err(|e| HandshakeError::InvalidFingerprint(e.to_string()))?;
        Ok(Self(digest))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::keypair::test_key_pair;

    #[test]
    fn known_sha256_vectors() {
        assert_eq!(
            Fingerprint::of_der(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            Fingerprint::of_der(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_is_64_lowercase_hex() {
        let kp = test_key_pair();
        let fp = fingerprint(kp.public()).to_string();
        assert_eq!(fp.len(), FINGERPRINT_HEX_LEN);
        assert!(
            fp.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn fingerprint_hashes_der_not_payload_text() {
        let kp = test_key_pair();
        let fp = fingerprint(kp.public());
        assert_eq!(fp, Fingerprint::of_der(kp.public().as_der()));
        let text = crate::payload::encode(&kp);
        assert_ne!(fp, Fingerprint::of_der(text.as_str().as_bytes()));
    }

    #[test]
    fn grouped_has_four_lines_of_four_groups() {
        let fp = Fingerprint::of_der(b"abc");
        let grouped = fp.grouped();
        let lines: Vec<&str> = grouped.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "ba78 16bf 8f01 cfea");
        for line in lines {
            assert_eq!(line.split(' ').count(), 4);
        }
    }

    #[test]
    fn parse_accepts_separated_and_uppercase_forms() {
        let fp = Fingerprint::of_der(b"abc");
        let colon = fp
            .to_string()
            .as_bytes()
            .chunks(2)
            .map(|c| std::str::from_utf8(c).unwrap().to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(":");
        assert_eq!(colon.parse::<Fingerprint>().unwrap(), fp);
        assert_eq!(fp.grouped().parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn parse_rejects_wrong_length_and_non_hex() {
        assert!(matches!(
            "abcd".parse::<Fingerprint>(),
            Err(HandshakeError::InvalidFingerprint(_))
        ));
        let not_hex = "z".repeat(FINGERPRINT_HEX_LEN);
        assert!(matches!(
            not_hex.parse::<Fingerprint>(),
            Err(HandshakeError::InvalidFingerprint(_))
        ));
    }

    #[test]
    fn matches_is_equality() {
        let a = Fingerprint::of_der(b"a");
        let b = Fingerprint::of_der(b"b");
        assert!(a.matches(&a));
        assert!(!a.matches(&b));
    }

    #[test]
    fn serde_uses_hex_string() {
        let fp = Fingerprint::of_der(b"abc");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{fp}\""));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
        assert!(serde_json::from_str::<Fingerprint>("\"00\"").is_err());
    }

    proptest! {
        #[test]
        fn fingerprint_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..600)) {
            prop_assert_eq!(Fingerprint::of_der(&bytes), Fingerprint::of_der(&bytes));
        }

        #[test]
        fn single_bit_flip_changes_fingerprint(
            bytes in proptest::collection::vec(any::<u8>(), 1..600),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut flipped = bytes.clone();
            let i = index.index(flipped.len());
            flipped[i] ^= 1 << bit;
            prop_assert_ne!(Fingerprint::of_der(&bytes), Fingerprint::of_der(&flipped));
        }
    }
}
