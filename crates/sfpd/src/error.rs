//! Error types for sfpd
//!
//! Driver and decoder faults keep their own types and are wrapped here;
//! the broker turns every variant into a reply at the command boundary.

use std::io;

use sfp_eeprom::EepromError;
use sfp_phy::PhyError;
use thiserror::Error;

/// Transceiver daemon errors
#[derive(Error, Debug)]
pub enum SfpdError {
    /// No module in the port
    #[error("SFP not present")]
    NotPresent,

    /// The platform gives no register access to this port
    #[error("bus not supported for {port}")]
    BusNotSupported {
        /// Port type and index, e.g. "SFP 17"
        port: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// PHY driver fault
    #[error(transparent)]
    Phy(#[from] PhyError),

    /// EEPROM contents could not be decoded
    #[error(transparent)]
    Eeprom(#[from] EepromError),

    /// Extra state claims a different value for a reserved record key
    #[error("Conflict at {path}")]
    State {
        /// The reserved key
        path: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unserviceable request
    #[error("{0}")]
    Command(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The command thread has exited
    #[error("broker stopped")]
    Stopped,

    /// Malformed monitor frame
    #[error("Monitor frame error: {0}")]
    Frame(String),
}

impl SfpdError {
    /// Creates a bus-not-supported error.
    pub fn bus_not_supported(port: impl Into<String>) -> Self {
        Self::BusNotSupported { port: port.into() }
    }

    /// Creates a state conflict error.
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::State { path: path.into() }
    }

    /// Creates a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Returns true if the module is simply absent.
    pub fn is_not_present(&self) -> bool {
        matches!(self, SfpdError::NotPresent)
    }

    /// Returns true if there is no PHY to talk to: no module, no bus, or
    /// nothing answering at the PHY address.
    pub fn is_phy_absent(&self) -> bool {
        match self {
            SfpdError::NotPresent | SfpdError::BusNotSupported { .. } => true,
            SfpdError::Phy(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for sfpd operations
pub type Result<T> = std::result::Result<T, SfpdError>;
