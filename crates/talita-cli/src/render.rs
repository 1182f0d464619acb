//! QR renderers for the terminal and for SVG files.

use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use talita_core::ErrorCorrection;
use talita_handshake::{CodeRenderer, EncodedPayload, Geometry, HandshakeError};

/// Renders a code as text using full-block characters, two columns per
/// module so it stays roughly square in a terminal. A terminal cannot
/// scale, so geometry is ignored.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    pub level: ErrorCorrection,
}

/// Renders a code as an SVG document. Geometry is a minimum size in pixels.
#[derive(Debug, Clone, Copy)]
pub struct SvgRenderer {
    pub level: ErrorCorrection,
}

impl CodeRenderer for TerminalRenderer {
    type Output = String;

    fn render(
        &self,
        payload: &EncodedPayload,
        _geometry: Geometry,
    ) -> Result<String, HandshakeError> {
        let code = build_code(payload, self.level)?;
        Ok(code
            .render::<char>()
            .quiet_zone(true)
            .module_dimensions(2, 1)
            .build())
    }
}

impl CodeRenderer for SvgRenderer {
    type Output = String;

    fn render(
        &self,
        payload: &EncodedPayload,
        geometry: Geometry,
    ) -> Result<String, HandshakeError> {
        let code = build_code(payload, self.level)?;
        Ok(code
            .render::<svg::Color<'_>>()
            .min_dimensions(geometry.width, geometry.height)
            .build())
    }
}

const fn ec_level(level: ErrorCorrection) -> EcLevel {
    match level {
        ErrorCorrection::Low => EcLevel::L,
        ErrorCorrection::Medium => EcLevel::M,
        ErrorCorrection::Quartile => EcLevel::Q,
        ErrorCorrection::High => EcLevel::H,
    }
}

fn build_code(payload: &EncodedPayload, level: ErrorCorrection) -> Result<QrCode, HandshakeError> {
    QrCode::with_error_correction_level(payload.as_str(), ec_level(level))
        .map_err(|e| map_qr_error(&e, payload.len(), level))
}

fn map_qr_error(err: &QrError, len: usize, level: ErrorCorrection) -> HandshakeError {
    match err {
        QrError::DataTooLong => HandshakeError::Encoding {
            len,
            capacity: level.byte_capacity(),
            level,
        },
        other => HandshakeError::Render(other.to_string()),
    }
}
