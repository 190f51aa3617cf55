//! protocol
//!
//! The wire contract for both listening ports: the SRP-based login
//! protocol and the framed, header-obfuscated world protocol. Every
//! opcode and result code in here has a fixed numeric value that is part
//! of the contract; do not renumber.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications,
    clippy::useless_conversion,
    clippy::todo,
    clippy::unimplemented
)]

pub mod auth;
pub mod world;

use thiserror::Error;

/// Errors raised while parsing an inbound packet body.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketParseError {
    #[error("packet ends before its declared contents")]
    Truncated,
    #[error("string field is not valid utf-8")]
    BadString,
    #[error("value {1} is not valid for field {0}")]
    BadValue(&'static str, u32),
}

pub(crate) fn read_cstring(data: &mut &[u8]) -> Result<String, PacketParseError> {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketParseError::Truncated)?;
    let s = std::str::from_utf8(&data[..end])
        .map_err(|_| PacketParseError::BadString)?
        .to_string();
    *data = &data[end + 1..];
    Ok(s)
}

pub(crate) fn ensure_remaining(data: &[u8], len: usize) -> Result<(), PacketParseError> {
    if data.len() < len {
        Err(PacketParseError::Truncated)
    } else {
        Ok(())
    }
}
