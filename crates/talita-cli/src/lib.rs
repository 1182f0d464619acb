//! Talita CLI Library
//!
//! Shows this device's key-exchange QR code, accepts a peer's payload and
//! manages the resulting trusted contacts.

pub mod contacts_cmd;
pub mod handshake_cmd;
pub mod render;
pub mod scan;
