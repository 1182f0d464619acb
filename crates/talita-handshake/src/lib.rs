//! Talita QR handshake.
//!
//! Two devices swap RSA public keys by showing each other a QR code. Each
//! side generates one keypair per session, publishes the public half as
//! Base64 SubjectPublicKeyInfo DER, and accepts the peer's code after strict
//! validation. Users confirm the exchange by comparing SHA-256 fingerprints.
//!
//! ## Pieces
//!
//! - **Keys**: [`KeyPairProvider`] generates the session keypair once and
//!   hands out shared references afterwards.
//! - **Payload**: [`encode`] and [`decode`] convert between key material and
//!   the text carried by the code.
//! - **Fingerprint**: [`Fingerprint`] is the digest users read out.
//! - **Orchestration**: [`Handshake`] ties these to the renderer, scanner
//!   and contact store collaborators.

pub mod collaborators;
pub mod contacts;
pub mod error;
pub mod fingerprint;
pub mod fingerprint_visual;
pub mod handshake;
pub mod keypair;
pub mod material;
pub mod payload;

pub use collaborators::{CodeRenderer, CodeScanner, Geometry, ScanOutcome};
pub use contacts::{
    ContactBook, ContactCheck, ContactEntry, ContactStore, JsonContactStore, MemoryContactStore,
    TrustedContact,
};
pub use error::{DecodeStage, HandshakeError, PayloadError, ScanAbort};
pub use fingerprint::{FINGERPRINT_HEX_LEN, Fingerprint, fingerprint};
pub use fingerprint_visual::{compare_fingerprints, fingerprint_randomart};
pub use handshake::Handshake;
#[cfg(any(test, feature = "test-utils"))]
pub use keypair::test_key_pair;
pub use keypair::{KeyGenerator, KeyPair, KeyPairProvider, OsKeyGenerator};
pub use material::{KeyAlgorithm, PublicKeyMaterial};
pub use payload::{EncodedPayload, MAX_PAYLOAD_CHARS, decode, encode, encode_material};
