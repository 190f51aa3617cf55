//! The world-port wire format: framed packets with obfuscated headers
//! once a session key is installed, and the payload codecs for the
//! opcodes this server speaks.

mod header;
mod opcodes;
mod packets;

pub use header::{
    decode_client_header, server_frame, FramingError, HeaderCrypto, CLIENT_HEADER_LEN,
    SERVER_HEADER_LEN,
};
pub use opcodes::OpCode;
pub use packets::*;
