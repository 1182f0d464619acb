//! Seams to the device: something that draws a code and something that
//! reads one.

use crate::error::{HandshakeError, ScanAbort};
use crate::payload::EncodedPayload;

/// Target size of a rendered code, in the renderer's own units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }
}

/// Turns payload text into a displayable code.
pub trait CodeRenderer {
    type Output;

    /// Render `payload` at roughly `geometry`. A payload too long for the
    /// symbology is reported as [`HandshakeError::Encoding`].
    fn render(
        &self,
        payload: &EncodedPayload,
        geometry: Geometry,
    ) -> Result<Self::Output, HandshakeError>;
}

/// What a scan attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Raw text read from a code. Untrusted.
    Scanned(String),
    Cancelled,
    /// No scanner could be used; the reason is for the user.
    Unavailable(String),
}

impl ScanOutcome {
    /// The scanned text, or [`HandshakeError::ScanAborted`].
    pub fn into_text(self) -> Result<String, HandshakeError> {
        match self {
            Self::Scanned(text) => Ok(text),
            Self::Cancelled => Err(HandshakeError::ScanAborted(ScanAbort::Cancelled)),
            Self::Unavailable(reason) => {
                Err(HandshakeError::ScanAborted(ScanAbort::Unavailable(reason)))
            }
        }
    }
}

/// Reads one code.
pub trait CodeScanner {
    fn scan(&mut self) -> ScanOutcome;
}

impl<F: FnMut() -> ScanOutcome> CodeScanner for F {
    fn scan(&mut self) -> ScanOutcome {
        self()
    }
}
