use bytes::{Buf, BufMut};
use thiserror::Error;

/// A field-indexed sparse update record: a bitmask of dirty field indices
/// plus the 32-bit values, serialised as
/// `[mask_len u8][mask u32-le * mask_len][value * 4B]`.
///
/// Values are appended in the order fields are added; the snapshot differ
/// always adds in ascending index order, which is the order the parser
/// reassembles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectUpdate {
    mask_blocks: Vec<u32>,
    update_blocks: Vec<[u8; 4]>,
}

impl ObjectUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.update_blocks.is_empty()
    }

    /// The number of dirty words recorded so far.
    pub fn len(&self) -> usize {
        self.update_blocks.len()
    }

    pub fn mask_blocks(&self) -> &[u32] {
        &self.mask_blocks
    }

    pub fn add_u32(&mut self, index: u16, value: u32) {
        self.set_bit(index);
        self.update_blocks.push(value.to_le_bytes());
    }

    pub fn add_f32(&mut self, index: u16, value: f32) {
        self.add_u32(index, value.to_bits());
    }

    /// Add a two-word field; the high word is always set alongside the
    /// low one.
    pub fn add_u64(&mut self, index: u16, value: u64) {
        self.add_u32(index, value as u32);
        self.add_u32(index + 1, (value >> 32) as u32);
    }

    fn set_bit(&mut self, index: u16) {
        let block = usize::from(index) / 32;
        if self.mask_blocks.len() <= block {
            self.mask_blocks.resize(block + 1, 0);
        }
        self.mask_blocks[block] |= 1u32 << (index % 32);
    }

    /// Serialise to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.mask_blocks.len() * 4 + self.update_blocks.len() * 4);
        out.put_u8(self.mask_blocks.len() as u8);
        for block in &self.mask_blocks {
            out.put_u32_le(*block);
        }
        for value in &self.update_blocks {
            out.put_slice(value);
        }
        out
    }

    /// Parse a serialised record back into `(field index, value)` pairs,
    /// ascending.
    pub fn parse(mut data: &[u8]) -> Result<Vec<(u16, u32)>, UpdateParseError> {
        if data.is_empty() {
            return Err(UpdateParseError::Truncated);
        }
        let mask_len = usize::from(data.get_u8());
        if data.remaining() < mask_len * 4 {
            return Err(UpdateParseError::Truncated);
        }

        let mut indices = Vec::new();
        for block in 0..mask_len {
            let word = data.get_u32_le();
            for bit in 0..32u16 {
                if word & (1u32 << bit) != 0 {
                    indices.push(block as u16 * 32 + bit);
                }
            }
        }

        if data.remaining() < indices.len() * 4 {
            return Err(UpdateParseError::Truncated);
        }
        Ok(indices
            .into_iter()
            .map(|index| (index, data.get_u32_le()))
            .collect())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateParseError {
    #[error("update record ends before its declared mask or values")]
    Truncated,
}
