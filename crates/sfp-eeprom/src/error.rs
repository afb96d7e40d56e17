//! Error types for EEPROM decoding

use thiserror::Error;

/// EEPROM decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EepromError {
    /// The contents are not what the layout requires
    #[error("EEPROM is corrupted or empty: {0}")]
    Corrupt(String),

    /// A field extends past the end of the data
    #[error("EEPROM data truncated: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Offset of the field
        offset: usize,
        /// Bytes the field needs
        needed: usize,
        /// Bytes available in total
        available: usize,
    },
}

impl EepromError {
    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

/// Result type for EEPROM decoding
pub type Result<T> = std::result::Result<T, EepromError>;

/// Borrows `len` bytes at `offset`, or reports how far short the data is.
pub(crate) fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(EepromError::Truncated {
            offset,
            needed: len,
            available: data.len(),
        })
}

/// Reads the byte at `offset`.
pub(crate) fn byte(data: &[u8], offset: usize) -> Result<u8> {
    Ok(slice(data, offset, 1)?[0])
}
