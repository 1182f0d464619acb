//! `Talita` Core Library
//!
//! Shared functionality for `Talita` components:
//! - Configuration resolution and hierarchy
//! - Key strength and QR error-correction settings
//! - Tracing/logging initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{Config, ErrorCorrection, KeyStrength};
pub use error::{Error, Result};
