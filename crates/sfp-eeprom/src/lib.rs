//! Identification EEPROM decoding for transceivers and boards.
//!
//! - [`onie`]: ONIE TlvInfo board identity (product, serial, base MAC, ...)
//! - [`sff`]: the SFF-8472 / SFF-8636 bytes used to classify SFP and QSFP
//!   modules, and the page and window layout the daemon reads

pub mod error;
pub mod onie;
pub mod sff;

pub use error::{EepromError, Result};
pub use onie::{TlvInfo, TlvRecord, TlvValue, VendorExtension};
pub use sff::{sfp_pages, ModuleFields, MonitorWindow, PortType, QsfpFields, SfpFields};
