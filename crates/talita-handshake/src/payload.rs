//! QR payload encoding and decoding.
//!
//! A payload is the public key's SubjectPublicKeyInfo DER bytes in standard
//! Base64 (RFC 4648 alphabet) with `=` padding. Decoding uses the same
//! engine, which insists on canonical padding and zero trailing bits, so two
//! different payload strings never decode to the same key.
//!
//! Scanned text is untrusted. [`decode`] checks, in order: length, Base64,
//! DER structure, algorithm OID, RSA key validity, modulus size, exponent,
//! and finally that the key re-encodes to the exact bytes received.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs8::der::Decode;
use rsa::pkcs8::{EncodePublicKey, SubjectPublicKeyInfoRef};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use talita_core::{ErrorCorrection, KeyStrength};

use crate::error::{HandshakeError, PayloadError};
use crate::keypair::KeyPair;
use crate::material::PublicKeyMaterial;

/// Longest scanned text accepted. A 4096-bit key needs 736 characters.
pub const MAX_PAYLOAD_CHARS: usize = 4096;

/// The only public exponent accepted, the one every generator uses.
pub const PUBLIC_EXPONENT: u32 = 65_537;

/// Base64 text of a public key, ready for an optical code.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail if the payload cannot fit a QR code at `level`.
    pub fn check_capacity(&self, level: ErrorCorrection) -> Result<(), HandshakeError> {
        let capacity = level.byte_capacity();
        if self.len() > capacity {
            return Err(HandshakeError::Encoding {
                len: self.len(),
                capacity,
                level,
            });
        }
        Ok(())
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("len", &self.0.len())
            .finish()
    }
}

impl AsRef<str> for EncodedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode the public half of `key_pair`.
pub fn encode(key_pair: &KeyPair) -> EncodedPayload {
    encode_material(key_pair.public())
}

/// Encode already validated key material.
pub fn encode_material(material: &PublicKeyMaterial) -> EncodedPayload {
    EncodedPayload(STANDARD.encode(material.as_der()))
}

/// Decode scanned text into a validated RSA public key.
///
/// Leading and trailing ASCII whitespace is ignored; whitespace anywhere
/// else is an error.
pub fn decode(text: &str) -> Result<PublicKeyMaterial, PayloadError> {
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        return Err(PayloadError::Empty);
    }
    if text.len() > MAX_PAYLOAD_CHARS {
        return Err(PayloadError::TooLong {
            len: text.len(),
            max: MAX_PAYLOAD_CHARS,
        });
    }
    let der = STANDARD.decode(text)?;
    parse_spki(der)
}

fn parse_spki(der: Vec<u8>) -> Result<PublicKeyMaterial, PayloadError> {
    let spki = SubjectPublicKeyInfoRef::from_der(&der).map_err(PayloadError::Der)?;
    if spki.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
        return Err(PayloadError::UnexpectedAlgorithm {
            oid: spki.algorithm.oid.to_string(),
        });
    }

    let key = RsaPublicKey::try_from(spki).map_err(|e| PayloadError::InvalidKey(e.to_string()))?;
    check_parameters(&key)?;

    let canonical = key
        .to_public_key_der()
        .map_err(|e| PayloadError::InvalidKey(e.to_string()))?;
    if canonical.as_bytes() != der.as_slice() {
        return Err(PayloadError::NonCanonical);
    }

    Ok(PublicKeyMaterial::new(der, key))
}

fn check_parameters(key: &RsaPublicKey) -> Result<(), PayloadError> {
    let bits = key.n().bits();
    if KeyStrength::from_bits(bits).is_none() {
        return Err(PayloadError::UnsupportedModulus { bits });
    }
    let odd = key.n().to_bytes_be().last().is_some_and(|b| b & 1 == 1);
    if !odd {
        return Err(PayloadError::InvalidKey("modulus is even".into()));
    }
    if *key.e() != BigUint::from(PUBLIC_EXPONENT) {
        return Err(PayloadError::UnsupportedExponent);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use rand::RngCore;
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;

    use super::*;
    use crate::error::DecodeStage;
    use crate::fingerprint::Fingerprint;
    use crate::keypair::test_key_pair;

    const BASE64_ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    /// Ed25519 SubjectPublicKeyInfo prefix (OID 1.3.101.112); append 32 key bytes.
    const ED25519_SPKI_PREFIX: [u8; 12] = [
        0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
    ];

    fn valid_der() -> Vec<u8> {
        test_key_pair().public().as_der().to_vec()
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let kp = test_key_pair();
        let payload = encode(&kp);
        let decoded = decode(payload.as_str()).unwrap();
        assert_eq!(&decoded, kp.public());
        assert_eq!(decoded.as_der(), kp.public().as_der());
        assert_eq!(decoded.rsa_public_key(), kp.public().rsa_public_key());
    }

    #[test]
    fn rsa2048_payload_is_unpadded_392_chars() {
        // 294 DER bytes is a multiple of three, so there is no padding.
        let payload = encode(&test_key_pair());
        assert_eq!(test_key_pair().public().as_der().len(), 294);
        assert_eq!(payload.len(), 392);
        assert!(!payload.as_str().contains('='));
        assert!(payload.check_capacity(ErrorCorrection::High).is_ok());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let payload = encode(&test_key_pair());
        let padded = format!("  {payload}\r\n");
        assert_eq!(&decode(&padded).unwrap(), test_key_pair().public());
    }

    #[test]
    fn interior_whitespace_is_rejected() {
        let payload = encode(&test_key_pair()).into_string();
        let wrapped = format!("{}\n{}", &payload[..76], &payload[76..]);
        let err = decode(&wrapped).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Text);
    }

    #[test]
    fn empty_input_is_malformed() {
        assert_eq!(decode(""), Err(PayloadError::Empty));
        assert_eq!(decode(" \n\t"), Err(PayloadError::Empty));
    }

    #[test]
    fn non_base64_input_is_malformed() {
        let err = decode("not base64!!").unwrap_err();
        assert!(matches!(err, PayloadError::Base64(_)));
    }

    #[test]
    fn random_bytes_are_malformed() {
        let mut bytes = [0u8; 294];
        OsRng.fill_bytes(&mut bytes);
        let err = decode(&STANDARD.encode(bytes)).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Structure);
    }

    #[test]
    fn oversized_input_is_rejected_before_decoding() {
        let text = "A".repeat(MAX_PAYLOAD_CHARS + 4);
        assert_eq!(
            decode(&text),
            Err(PayloadError::TooLong {
                len: MAX_PAYLOAD_CHARS + 4,
                max: MAX_PAYLOAD_CHARS,
            })
        );
    }

    #[test]
    fn other_algorithm_is_rejected_by_oid() {
        let mut spki = ED25519_SPKI_PREFIX.to_vec();
        spki.extend_from_slice(&[7u8; 32]);
        let err = decode(&STANDARD.encode(&spki)).unwrap_err();
        assert_eq!(
            err,
            PayloadError::UnexpectedAlgorithm {
                oid: "1.3.101.112".into()
            }
        );
        assert_eq!(err.stage(), DecodeStage::Algorithm);
    }

    #[test]
    fn weak_rsa_key_is_rejected() {
        let weak = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = weak.to_public_key().to_public_key_der().unwrap();
        let err = decode(&STANDARD.encode(der.as_bytes())).unwrap_err();
        assert_eq!(err, PayloadError::UnsupportedModulus { bits: 1024 });
    }

    #[test]
    fn non_null_algorithm_parameters_are_rejected() {
        // AlgorithmIdentifier parameters live at bytes 17..19 as `05 00`.
        let mut der = valid_der();
        assert_eq!(&der[17..19], &[0x05, 0x00]);
        der[17] = 0x04;
        let err = decode(&STANDARD.encode(&der)).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Structure);
    }

    #[test]
    fn other_public_exponent_is_rejected() {
        // The exponent 01 00 01 is the last three bytes.
        let mut der = valid_der();
        let len = der.len();
        assert_eq!(&der[len - 3..], &[0x01, 0x00, 0x01]);
        der[len - 1] = 0x03;
        assert_eq!(
            decode(&STANDARD.encode(&der)),
            Err(PayloadError::UnsupportedExponent)
        );
    }

    #[test]
    fn even_modulus_is_rejected() {
        // The last modulus byte sits just before `02 03 01 00 01`.
        let mut der = valid_der();
        let idx = der.len() - 6;
        der[idx] &= 0xfe;
        let err = decode(&STANDARD.encode(&der)).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidKey(_)));
    }

    #[test]
    fn trailing_bytes_after_spki_are_rejected() {
        let mut der = valid_der();
        der.push(0);
        let err = decode(&STANDARD.encode(&der)).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Structure);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let payload = encode(&test_key_pair()).into_string();
        for cut in [4, 44, 200, 388] {
            assert!(decode(&payload[..cut]).is_err(), "prefix of {cut} chars decoded");
        }
    }

    #[test]
    fn unpadded_form_is_rejected() {
        // 293 bytes encode with one `=`; dropping it must not be tolerated.
        let der = {
            let mut d = valid_der();
            d.pop();
            d
        };
        let text = STANDARD.encode(&der);
        assert!(text.ends_with('='));
        let err = decode(text.trim_end_matches('=')).unwrap_err();
        assert!(matches!(err, PayloadError::Base64(_)));
    }

    #[test]
    fn rsa3072_payload_round_trips_with_padding_enforced() {
        let kp = KeyPair::generate(KeyStrength::Rsa3072).unwrap();
        let payload = encode(&kp).into_string();
        // 422 DER bytes leave a two-byte tail, hence exactly one `=`.
        assert_eq!(kp.public().as_der().len(), 422);
        assert_eq!(payload.len(), 564);
        assert!(payload.ends_with('=') && !payload.ends_with("=="));
        assert_eq!(&decode(&payload).unwrap(), kp.public());

        let body = &payload[..payload.len() - 1];
        assert!(matches!(decode(body), Err(PayloadError::Base64(_))));
        assert!(decode(&format!("{payload}=")).is_err());
        let err = decode(&format!("{body}A")).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Structure);

        // The last data character carries two trailing bits that must be zero.
        let last = body.as_bytes()[body.len() - 1];
        let index = BASE64_ALPHABET.iter().position(|&c| c == last).unwrap();
        assert_eq!(index % 4, 0);
        let mut noisy = body[..body.len() - 1].to_string();
        noisy.push(char::from(BASE64_ALPHABET[index + 1]));
        noisy.push('=');
        assert!(matches!(decode(&noisy), Err(PayloadError::Base64(_))));
    }

    #[test]
    fn single_character_corruption_never_yields_the_same_key_silently() {
        let kp = test_key_pair();
        let original = encode(&kp).into_string();
        let original_fp = kp.public().fingerprint();
        let bytes = original.as_bytes();

        for pos in 0..bytes.len() {
            let current = BASE64_ALPHABET
                .iter()
                .position(|&c| c == bytes[pos])
                .unwrap();
            let replacements = [
                BASE64_ALPHABET[(current + 1) % BASE64_ALPHABET.len()],
                BASE64_ALPHABET[(current + 33) % BASE64_ALPHABET.len()],
                b'!',
                b'=',
            ];
            for replacement in replacements {
                let mut corrupted = bytes.to_vec();
                corrupted[pos] = replacement;
                let text = String::from_utf8(corrupted).unwrap();

                match decode(&text) {
                    Err(_) => {}
                    Ok(material) => {
                        // Header (first 33 DER bytes = 44 chars) and exponent
                        // (last 4 chars) positions must always fail.
                        assert!(
                            (44..388).contains(&pos),
                            "corruption at {pos} decoded to a key"
                        );
                        assert_ne!(material.as_der(), kp.public().as_der());
                        assert_ne!(Fingerprint::of(&material), original_fp);
                    }
                }
            }
        }
    }

    #[test]
    fn capacity_check_reports_encoding_failure() {
        let payload = EncodedPayload("A".repeat(2000));
        assert!(payload.check_capacity(ErrorCorrection::Low).is_ok());
        let err = payload.check_capacity(ErrorCorrection::High).unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::Encoding {
                len: 2000,
                capacity: 1273,
                level: ErrorCorrection::High
            }
        ));
    }

    #[test]
    fn debug_does_not_print_payload_text() {
        let payload = encode(&test_key_pair());
        let debug_output = format!("{payload:?}");
        assert!(debug_output.contains("392"));
        assert!(!debug_output.contains(&payload.as_str()[..20]));
    }

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(text in ".{0,600}") {
            let _ = decode(&text);
        }

        #[test]
        fn base64_of_random_bytes_is_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..600)) {
            prop_assert!(decode(&STANDARD.encode(&bytes)).is_err());
        }
    }
}
