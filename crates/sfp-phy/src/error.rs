//! Error types for PHY access.
//!
//! Two layers: [`BusError`] is what a [`crate::RegisterBus`] implementation
//! reports, [`PhyError`] is what the driver and directory raise. The
//! conversion between them keeps "nothing answered at that address" apart
//! from every other failure.

use std::io;
use thiserror::Error;

/// Result type alias for PHY operations.
pub type Result<T> = std::result::Result<T, PhyError>;

/// Failures reported by a register bus binding.
#[derive(Debug, Error)]
pub enum BusError {
    /// No device acknowledged the given bus address.
    #[error("no device at bus address 0x{addr:02x}")]
    NoDevice {
        /// The administrative address that was probed.
        addr: u8,
    },

    /// The bus transaction failed.
    #[error("bus I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The bus transport answered with something other than success.
    #[error("bus transaction rejected: {0}")]
    Rejected(String),
}

/// Errors raised by the PHY driver, codec and directory.
#[derive(Debug, Error)]
pub enum PhyError {
    /// No PHY, or no supported PHY, at the expected address.
    #[error("PHY not found: {0}")]
    NotFound(String),

    /// A register access or handshake failed.
    #[error("PHY access failed: {0}")]
    Access(String),

    /// A register held a value the decoder has no meaning for.
    #[error("PHY register decode failed: {0}")]
    Decode(String),

    /// The caller asked for a configuration the PHY cannot take.
    #[error("invalid PHY configuration: {0}")]
    Config(String),
}

impl PhyError {
    /// Creates an access error.
    pub fn access(message: impl Into<String>) -> Self {
        Self::Access(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Returns true if the error means "no PHY there" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PhyError::NotFound(_))
    }
}

impl From<BusError> for PhyError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::NoDevice { addr } => {
                PhyError::NotFound(format!("phy at address 0x{addr:02x} not found"))
            }
            other => PhyError::Access(other.to_string()),
        }
    }
}
