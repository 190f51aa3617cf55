use thiserror::Error;

use runeward_srp::SessionKey;

use super::OpCode;

/// Length of a server→client header: u16 big-endian size + u16 opcode.
pub const SERVER_HEADER_LEN: usize = 4;
/// Length of a client→server header: u16 big-endian size + u32 opcode.
pub const CLIENT_HEADER_LEN: usize = 6;

/// The header obfuscation cipher, keyed by the 40-byte session key with
/// independent state per direction. Bodies are never touched; before a
/// key is installed headers travel in clear and this struct is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCrypto {
    key: SessionKey,
    send_i: u8,
    send_j: u8,
    recv_i: u8,
    recv_j: u8,
}

impl HeaderCrypto {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            send_i: 0,
            send_j: 0,
            recv_i: 0,
            recv_j: 0,
        }
    }

    /// Obfuscate an outgoing header in place:
    /// `x = (b - j) XOR K[i]`, then `j` tracks the obfuscated byte.
    pub fn encrypt(&mut self, header: &mut [u8]) {
        for byte in header {
            let x = byte.wrapping_sub(self.send_j) ^ self.key[usize::from(self.send_i)];
            self.send_i = (self.send_i + 1) % self.key.len() as u8;
            self.send_j = x;
            *byte = x;
        }
    }

    /// Clarify an incoming header in place:
    /// `x = (b XOR K[i]) + j`, with `j` tracking the obfuscated byte.
    pub fn decrypt(&mut self, header: &mut [u8]) {
        for byte in header {
            let x = (*byte ^ self.key[usize::from(self.recv_i)]).wrapping_add(self.recv_j);
            self.recv_i = (self.recv_i + 1) % self.key.len() as u8;
            self.recv_j = *byte;
            *byte = x;
        }
    }

    #[cfg(test)]
    fn send_state(&self) -> (u8, u8) {
        (self.send_i, self.send_j)
    }
}

/// Errors in the framing layer; all of them are fatal to the connection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("declared packet size {0} is smaller than its opcode")]
    BadLength(u16),
    #[error("packet body of {0} bytes exceeds the frame limit")]
    Oversized(u32),
}

/// Upper bound on a single client packet body; anything larger is a
/// framing error rather than an allocation.
const MAX_CLIENT_BODY: u32 = 0x2800;

/// Decode (and if a cipher is installed, first clarify) a client header.
/// Returns the raw 4-byte opcode and the body length that follows.
pub fn decode_client_header(
    header: &mut [u8; CLIENT_HEADER_LEN],
    crypto: Option<&mut HeaderCrypto>,
) -> Result<(u32, usize), FramingError> {
    if let Some(crypto) = crypto {
        crypto.decrypt(&mut header[..]);
    }

    let size = u16::from_be_bytes([header[0], header[1]]);
    let opcode = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);
    if size < 4 {
        return Err(FramingError::BadLength(size));
    }
    let body_len = u32::from(size) - 4;
    if body_len > MAX_CLIENT_BODY {
        return Err(FramingError::Oversized(body_len));
    }
    Ok((opcode, body_len as usize))
}

/// Assemble a complete server→client frame, obfuscating the header when
/// a cipher is installed.
pub fn server_frame(opcode: OpCode, body: &[u8], crypto: Option<&mut HeaderCrypto>) -> Vec<u8> {
    let mut header = [0u8; SERVER_HEADER_LEN];
    header[..2].copy_from_slice(&(body.len() as u16 + 2).to_be_bytes());
    header[2..].copy_from_slice(&u16::from(opcode).to_le_bytes());

    if let Some(crypto) = crypto {
        crypto.encrypt(&mut header);
    }

    let mut frame = Vec::with_capacity(SERVER_HEADER_LEN + body.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(body);
    frame
}
