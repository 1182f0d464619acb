//! Session keypair generation and caching.
//!
//! Each process holds one RSA keypair, generated the first time a payload
//! is requested and reused for every payload after that. The private half
//! is never serialized and never leaves this module except by reference.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use talita_core::KeyStrength;
use tracing::{debug, info};

use crate::error::HandshakeError;
use crate::material::PublicKeyMaterial;

/// An RSA keypair for one device session.
pub struct KeyPair {
    private: RsaPrivateKey,
    public: PublicKeyMaterial,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate(strength: KeyStrength) -> Result<Self, HandshakeError> {
        Self::from_private_key(OsKeyGenerator.generate(strength)?)
    }

    /// Wrap an existing private key. Moduli other than 2048, 3072 or 4096
    /// bits are refused.
    pub fn from_private_key(private: RsaPrivateKey) -> Result<Self, HandshakeError> {
        let public_key = private.to_public_key();
        let bits = public_key.n().bits();
        if KeyStrength::from_bits(bits).is_none() {
            return Err(HandshakeError::KeyGeneration(format!(
                "unsupported RSA modulus of {bits} bits"
            )));
        }
        let der = public_key
            .to_public_key_der()
            .map_err(|e| HandshakeError::KeyGeneration(format!("SPKI encoding failed: {e}")))?;
        Ok(Self {
            private,
            public: PublicKeyMaterial::new(der.as_bytes().to_vec(), public_key),
        })
    }

    /// The public half.
    pub const fn public(&self) -> &PublicKeyMaterial {
        &self.public
    }

    /// The private key, for decrypting messages addressed to this session.
    /// Handle with care.
    pub const fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn strength(&self) -> Option<KeyStrength> {
        self.public.strength()
    }
}

/// Source of fresh RSA private keys.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, strength: KeyStrength) -> Result<RsaPrivateKey, HandshakeError>;
}

/// Generates keys from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    fn generate(&self, strength: KeyStrength) -> Result<RsaPrivateKey, HandshakeError> {
        RsaPrivateKey::new(&mut OsRng, strength.bits())
            .map_err(|e| HandshakeError::KeyGeneration(e.to_string()))
    }
}

/// Lazily generates and then caches the session keypair.
///
/// Concurrent first calls are serialized on an init lock so exactly one
/// generation runs; later calls only read the cell.
pub struct KeyPairProvider<G = OsKeyGenerator> {
    generator: G,
    strength: KeyStrength,
    cell: OnceLock<Arc<KeyPair>>,
    init: Mutex<()>,
    attempts: AtomicUsize,
}

impl KeyPairProvider<OsKeyGenerator> {
    pub fn new(strength: KeyStrength) -> Self {
        Self::with_generator(OsKeyGenerator, strength)
    }
}

impl<G: KeyGenerator> KeyPairProvider<G> {
    pub const fn with_generator(generator: G, strength: KeyStrength) -> Self {
        Self {
            generator,
            strength,
            cell: OnceLock::new(),
            init: Mutex::new(()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Return the session keypair, generating it on first use.
    ///
    /// A failed generation leaves the provider empty; the next call tries
    /// again.
    pub fn get_or_create_key_pair(&self) -> Result<Arc<KeyPair>, HandshakeError> {
        if let Some(kp) = self.cell.get() {
            return Ok(Arc::clone(kp));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(kp) = self.cell.get() {
            debug!("Keypair generated by a concurrent caller");
            return Ok(Arc::clone(kp));
        }

        self.attempts.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let private = self.generator.generate(self.strength)?;
        let kp = Arc::new(KeyPair::from_private_key(private)?);
        info!(
            bits = kp.public().modulus_bits(),
            fingerprint = %kp.public().fingerprint(),
            elapsed_ms = started.elapsed().as_millis(),
            "Generated session keypair"
        );
        Ok(Arc::clone(self.cell.get_or_init(|| kp)))
    }

    /// The keypair if it has already been generated.
    pub fn current(&self) -> Option<Arc<KeyPair>> {
        self.cell.get().cloned()
    }

    /// Number of generations started so far, successful or not.
    pub fn generation_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub const fn strength(&self) -> KeyStrength {
        self.strength
    }
}

impl<G> fmt::Debug for KeyPairProvider<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairProvider")
            .field("strength", &self.strength)
            .field("generated", &self.cell.get().is_some())
            .finish_non_exhaustive()
    }
}

/// A process-wide RSA-2048 keypair shared by tests, so each test binary
/// pays for one generation.
#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub fn test_key_pair() -> Arc<KeyPair> {
    static KEY: OnceLock<Arc<KeyPair>> = OnceLock::new();
    Arc::clone(KEY.get_or_init(|| {
        Arc::new(KeyPair::generate(KeyStrength::Rsa2048).expect("test key generation"))
    }))
}
