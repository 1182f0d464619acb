//! The two user-facing operations: produce my payload, accept a peer's.

use std::sync::Arc;

use talita_core::{Config, ErrorCorrection};
use tracing::{debug, info, warn};

use crate::collaborators::{CodeRenderer, CodeScanner, Geometry};
use crate::contacts::{ContactStore, TrustedContact};
use crate::error::HandshakeError;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::keypair::{KeyGenerator, KeyPair, KeyPairProvider, OsKeyGenerator};
use crate::material::PublicKeyMaterial;
use crate::payload::{self, EncodedPayload};

/// Orchestrates one device's side of a key exchange.
///
/// The only state kept between calls is the memoized session keypair, so a
/// `Handshake` can be shared across threads.
#[derive(Debug)]
pub struct Handshake<G = OsKeyGenerator> {
    keys: KeyPairProvider<G>,
    error_correction: ErrorCorrection,
}

impl Handshake<OsKeyGenerator> {
    pub fn new(config: &Config) -> Self {
        Self::with_provider(
            KeyPairProvider::new(config.keys.strength),
            config.code.error_correction,
        )
    }
}

impl<G: KeyGenerator> Handshake<G> {
    pub const fn with_provider(keys: KeyPairProvider<G>, error_correction: ErrorCorrection) -> Self {
        Self {
            keys,
            error_correction,
        }
    }

    pub const fn key_pair_provider(&self) -> &KeyPairProvider<G> {
        &self.keys
    }

    pub const fn error_correction(&self) -> ErrorCorrection {
        self.error_correction
    }

    /// This session's keypair, generated on first use.
    pub fn key_pair(&self) -> Result<Arc<KeyPair>, HandshakeError> {
        self.keys.get_or_create_key_pair()
    }

    /// Payload text for this device's public key, checked against the QR
    /// capacity at the configured error-correction level.
    pub fn prepare_outgoing(&self) -> Result<EncodedPayload, HandshakeError> {
        let kp = self.keys.get_or_create_key_pair()?;
        let encoded = payload::encode(&kp);
        encoded.check_capacity(self.error_correction)?;
        debug!(
            len = encoded.len(),
            level = %self.error_correction,
            "Prepared outgoing payload"
        );
        Ok(encoded)
    }

    /// Fingerprint of this device's public key.
    pub fn local_fingerprint(&self) -> Result<Fingerprint, HandshakeError> {
        let kp = self.keys.get_or_create_key_pair()?;
        Ok(fingerprint(kp.public()))
    }

    /// Prepare the payload and hand it to `renderer`.
    pub fn render_outgoing<R: CodeRenderer>(
        &self,
        renderer: &R,
        geometry: Geometry,
    ) -> Result<R::Output, HandshakeError> {
        let encoded = self.prepare_outgoing()?;
        renderer.render(&encoded, geometry)
    }

    /// Decode scanned text and derive its fingerprint. Nothing is stored.
    pub fn accept_incoming(
        &self,
        scanned: &str,
    ) -> Result<(PublicKeyMaterial, Fingerprint), HandshakeError> {
        match payload::decode(scanned) {
            Ok(material) => {
                let fp = fingerprint(&material);
                info!(
                    fingerprint = %fp,
                    bits = material.modulus_bits(),
                    "Accepted peer key"
                );
                Ok((material, fp))
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    stage = ?e.stage(),
                    "Rejected scanned payload"
                );
                Err(HandshakeError::MalformedPayload(e))
            }
        }
    }

    /// Run `scanner` once and accept what it read.
    pub fn accept_scan(
        &self,
        scanner: &mut impl CodeScanner,
    ) -> Result<(PublicKeyMaterial, Fingerprint), HandshakeError> {
        let text = scanner.scan().into_text().inspect_err(|e| {
            info!(reason = %e, "Scan produced no payload");
        })?;
        self.accept_incoming(&text)
    }

    /// Accept scanned text and store it as a contact.
    ///
    /// `store` is called exactly once when decoding succeeds and not at all
    /// when it fails.
    pub fn accept_and_persist(
        &self,
        scanned: &str,
        label: Option<&str>,
        store: &mut impl ContactStore,
    ) -> Result<TrustedContact, HandshakeError> {
        let (material, _) = self.accept_incoming(scanned)?;
        let mut contact = TrustedContact::from_public_key(material);
        if let Some(label) = label {
            contact = contact.with_label(label);
        }
        store.persist(&contact)?;
        Ok(contact)
    }
}
