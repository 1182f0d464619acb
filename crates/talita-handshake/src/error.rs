//! Handshake error types.

use std::fmt;

use rsa::pkcs8::der;
use talita_core::ErrorCorrection;

/// Errors surfaced by handshake operations.
///
/// Every variant is recoverable at the orchestrator boundary; none of them
/// is retried by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The local keypair could not be generated.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// The payload does not fit the optical channel.
    #[error("Payload of {len} bytes exceeds the {level} QR capacity of {capacity} bytes")]
    Encoding {
        len: usize,
        capacity: usize,
        level: ErrorCorrection,
    },

    /// A scanned code could not be read as a public key. The detailed
    /// reason is kept as the error source.
    #[error("Invalid code")]
    MalformedPayload(#[from] PayloadError),

    /// The user cancelled the scan or no scanner could be used.
    #[error("Scan aborted: {0}")]
    ScanAborted(ScanAbort),

    /// The rendering collaborator failed for a reason other than capacity.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// A fingerprint string could not be parsed.
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// A contact label is already bound to a different key.
    #[error("Contact {label:?} is already bound to fingerprint {expected}, refusing {actual}")]
    LabelConflict {
        label: String,
        expected: String,
        actual: String,
    },

    #[error("Contact store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandshakeError {
    /// The internal decode failure, when this is a malformed payload.
    pub const fn payload_error(&self) -> Option<&PayloadError> {
        match self {
            Self::MalformedPayload(e) => Some(e),
            _ => None,
        }
    }
}

/// Why a scan produced no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAbort {
    /// The user backed out of the scan.
    Cancelled,
    /// No scanner could be started.
    Unavailable(String),
}

impl fmt::Display for ScanAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled by user"),
            Self::Unavailable(reason) => write!(f, "scanner unavailable: {reason}"),
        }
    }
}

/// Which layer of the payload rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    /// The text is not a Base64 payload.
    Text,
    /// The bytes are not a well-formed RSA SubjectPublicKeyInfo.
    Structure,
    /// The key is well-formed but of another algorithm family.
    Algorithm,
}

/// Reason a scanned payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not a DER SubjectPublicKeyInfo: {0}")]
    Der(der::Error),

    #[error("unexpected key algorithm {oid}")]
    UnexpectedAlgorithm { oid: String },

    #[error("not a valid RSA public key: {0}")]
    InvalidKey(String),

    #[error("unsupported modulus size of {bits} bits")]
    UnsupportedModulus { bits: usize },

    #[error("unsupported public exponent")]
    UnsupportedExponent,

    #[error("key does not re-encode to the same DER bytes")]
    NonCanonical,
}

impl PayloadError {
    pub const fn stage(&self) -> DecodeStage {
        match self {
            Self::Empty | Self::TooLong { .. } | Self::Base64(_) => DecodeStage::Text,
            Self::UnexpectedAlgorithm { .. } => DecodeStage::Algorithm,
            Self::Der(_)
            | Self::InvalidKey(_)
            | Self::UnsupportedModulus { .. }
            | Self::UnsupportedExponent
            | Self::NonCanonical => DecodeStage::Structure,
        }
    }

    /// Short stable name for log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong { .. } => "too_long",
            Self::Base64(_) => "base64",
            Self::Der(_) => "der",
            Self::UnexpectedAlgorithm { .. } => "algorithm",
            Self::InvalidKey(_) => "invalid_key",
            Self::UnsupportedModulus { .. } => "modulus_size",
            Self::UnsupportedExponent => "exponent",
            Self::NonCanonical => "non_canonical",
        }
    }
}
