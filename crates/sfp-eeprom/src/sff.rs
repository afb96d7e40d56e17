//! Transceiver identification fields (SFF-8472 for SFP, SFF-8636 for QSFP).
//!
//! Only the handful of bytes the daemon publishes are decoded here. Offsets
//! are into the flat EEPROM image as read from the module: for SFP, bytes
//! 0-255 are the A0h page and 256-511 the A2h page; for QSFP, 0-127 are the
//! lower page and 128-255 upper page 00h.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{byte, EepromError, Result};

/// Transceiver form factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// SFP / SFP+ / SFP28
    #[serde(rename = "SFP")]
    Sfp,
    /// QSFP+ / QSFP28
    #[serde(rename = "QSFP")]
    Qsfp,
}

impl PortType {
    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::Sfp => "SFP",
            PortType::Qsfp => "QSFP",
        }
    }

    /// Bytes read from offset 0 to derive identification fields.
    pub fn identity_len(&self) -> usize {
        match self {
            PortType::Sfp => 128,
            PortType::Qsfp => 256,
        }
    }

    /// Region sampled by each monitoring pass.
    pub fn monitor_window(&self) -> MonitorWindow {
        match self {
            // A2h lower half: alarm thresholds and real time diagnostics
            PortType::Sfp => MonitorWindow {
                offset: 256,
                length: 128,
            },
            // Lower page: interrupt flags and monitors
            PortType::Qsfp => MonitorWindow {
                offset: 0,
                length: 128,
            },
        }
    }

    /// Wire code in monitor frames.
    pub fn code(&self) -> u8 {
        match self {
            PortType::Sfp => 0,
            PortType::Qsfp => 1,
        }
    }

    /// Inverse of [`PortType::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PortType::Sfp),
            1 => Some(PortType::Qsfp),
            _ => None,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortType {
    type Err = EepromError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SFP" => Ok(PortType::Sfp),
            "QSFP" => Ok(PortType::Qsfp),
            other => Err(EepromError::corrupt(format!("unexpected port type {other}"))),
        }
    }
}

/// A contiguous EEPROM region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorWindow {
    pub offset: u16,
    pub length: u16,
}

/// SFF-8472 A0h offsets and bits
pub mod sff8472 {
    /// 10G Ethernet compliance codes
    pub const ETH_10G: usize = 3;
    /// Ethernet compliance codes
    pub const ETH_COMPAT: usize = 6;
    /// Extended specification compliance codes
    pub const ETH_EXTENDED_COMP: usize = 36;
    /// Diagnostic monitoring type
    pub const DMT: usize = 92;
    /// SFF-8472 compliance revision
    pub const COMPLIANCE: usize = 94;

    /// ETH_COMPAT: 1000BASE-T
    pub const ETH_1000BASE_T: u8 = 1 << 3;
    /// DMT: digital diagnostic monitoring implemented
    pub const DMT_IMPLEMENTED: u8 = 0x40;
    /// DMT: address change required to reach A2h
    pub const DMT_ADDR_CHANGE: u8 = 0x04;

    /// EEPROM page codes reported to clients
    pub const PAGE_A0: u8 = 0xa0;
    pub const PAGE_A2: u8 = 0xa2;
}

/// SFF-8636 offsets and bits
pub mod sff8636 {
    /// Extended identifier
    pub const EXT_IDENTIFIER: usize = 129;
    /// 10/40G/100G Ethernet compliance codes
    pub const ETH_1040100G: usize = 131;
    /// Extended specification compliance codes
    pub const ETH_EXTENDED_COMP: usize = 192;

    /// EXT_IDENTIFIER: CDR present in Rx
    pub const RX_CDR_PRESENT: u8 = 1 << 2;
    /// ETH_1040100G: extended compliance byte is valid
    pub const EXTENDED_COMPLIANCE: u8 = 1 << 7;

    /// Pages every QSFP module is assumed to implement
    pub const PAGES: [u8; 4] = [0, 1, 2, 3];
}

/// Identification fields of an SFP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfpFields {
    pub eth_10g: u8,
    pub eth_compat: u8,
    pub eth_extended_comp: u8,
    pub compliance: u8,
}

impl SfpFields {
    /// Decodes the fields from an A0h image (at least 128 bytes).
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            eth_10g: byte(data, sff8472::ETH_10G)?,
            eth_compat: byte(data, sff8472::ETH_COMPAT)?,
            eth_extended_comp: byte(data, sff8472::ETH_EXTENDED_COMP)?,
            compliance: byte(data, sff8472::COMPLIANCE)?,
        })
    }

    /// Module claims an SFF-8472 revision, i.e. implements diagnostics.
    pub fn has_diagnostics(&self) -> bool {
        (0x01..=0x08).contains(&self.compliance)
    }

    /// Module is 1000BASE-T, so a copper PHY may sit behind it.
    pub fn may_support_sgmii(&self) -> bool {
        self.eth_compat & sff8472::ETH_1000BASE_T != 0
    }
}

impl Serialize for SfpFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("eeprom_eth_10g", &self.eth_10g)?;
        map.serialize_entry("eeprom_eth_compat", &self.eth_compat)?;
        map.serialize_entry("eeprom_eth_extended_comp", &self.eth_extended_comp)?;
        map.serialize_entry("has_diagnostics", &self.has_diagnostics())?;
        map.end()
    }
}

/// Identification fields of a QSFP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QsfpFields {
    pub ext_identifier: u8,
    pub eth_1040100g: u8,
    pub eth_extended_comp: u8,
}

impl QsfpFields {
    /// Decodes the fields from a lower plus upper page 00h image.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            ext_identifier: byte(data, sff8636::EXT_IDENTIFIER)?,
            eth_1040100g: byte(data, sff8636::ETH_1040100G)?,
            eth_extended_comp: byte(data, sff8636::ETH_EXTENDED_COMP)?,
        })
    }

    pub fn rx_cdr_present(&self) -> bool {
        self.ext_identifier & sff8636::RX_CDR_PRESENT != 0
    }

    /// The extended compliance byte, when byte 131 says it is valid.
    pub fn extended_compliance(&self) -> Option<u8> {
        (self.eth_1040100g & sff8636::EXTENDED_COMPLIANCE != 0).then_some(self.eth_extended_comp)
    }
}

impl Serialize for QsfpFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("rx_cdr_present", &self.rx_cdr_present())?;
        map.serialize_entry("eeprom_eth_1040100g", &self.eth_1040100g)?;
        if let Some(ext) = self.extended_compliance() {
            map.serialize_entry("eeprom_eth_extended_comp", &ext)?;
        }
        map.end()
    }
}

/// Fields derived from a module's identification prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModuleFields {
    Sfp(SfpFields),
    Qsfp(QsfpFields),
}

impl ModuleFields {
    /// Decodes the identification prefix of a module of `port_type`.
    pub fn parse(port_type: PortType, data: &[u8]) -> Result<Self> {
        match port_type {
            PortType::Sfp => SfpFields::parse(data).map(ModuleFields::Sfp),
            PortType::Qsfp => QsfpFields::parse(data).map(ModuleFields::Qsfp),
        }
    }

    /// Whether the module may carry an SGMII capable PHY. QSFPs never do.
    pub fn may_support_sgmii(&self) -> bool {
        match self {
            ModuleFields::Sfp(fields) => fields.may_support_sgmii(),
            ModuleFields::Qsfp(_) => false,
        }
    }
}

/// Pages an SFP implements given its diagnostic monitoring type byte.
///
/// A2h is listed only when diagnostics are implemented and reachable
/// without an address change.
pub fn sfp_pages(dmt: u8) -> Vec<u8> {
    let mask = sff8472::DMT_IMPLEMENTED | sff8472::DMT_ADDR_CHANGE;
    if dmt & mask == sff8472::DMT_IMPLEMENTED {
        vec![sff8472::PAGE_A0, sff8472::PAGE_A2]
    } else {
        vec![sff8472::PAGE_A0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sfp_image(eth_compat: u8, compliance: u8) -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[sff8472::ETH_10G] = 0x10;
        data[sff8472::ETH_COMPAT] = eth_compat;
        data[sff8472::ETH_EXTENDED_COMP] = 0x02;
        data[sff8472::COMPLIANCE] = compliance;
        data
    }

    #[test]
    fn test_port_type_names() {
        assert_eq!("SFP".parse::<PortType>().unwrap(), PortType::Sfp);
        assert_eq!("QSFP".parse::<PortType>().unwrap(), PortType::Qsfp);
        assert!("OSFP".parse::<PortType>().is_err());
        assert_eq!(serde_json::to_value(PortType::Qsfp).unwrap(), json!("QSFP"));
        assert_eq!(PortType::from_code(PortType::Qsfp.code()), Some(PortType::Qsfp));
        assert_eq!(PortType::from_code(7), None);
    }

    #[test]
    fn test_identity_lengths() {
        assert_eq!(PortType::Sfp.identity_len(), 128);
        assert_eq!(PortType::Qsfp.identity_len(), 256);
    }

    #[test]
    fn test_sfp_fields() {
        let fields = SfpFields::parse(&sfp_image(sff8472::ETH_1000BASE_T, 0x08)).unwrap();
        assert!(fields.has_diagnostics());
        assert!(fields.may_support_sgmii());
        assert_eq!(
            serde_json::to_value(fields).unwrap(),
            json!({
                "eeprom_eth_10g": 0x10,
                "eeprom_eth_compat": 0x08,
                "eeprom_eth_extended_comp": 0x02,
                "has_diagnostics": true,
            })
        );
    }

    #[test]
    fn test_sfp_diagnostics_range() {
        for (compliance, expected) in [(0x00, false), (0x01, true), (0x05, true), (0x08, true), (0x09, false), (0xff, false)] {
            let fields = SfpFields::parse(&sfp_image(0, compliance)).unwrap();
            assert_eq!(fields.has_diagnostics(), expected, "compliance 0x{compliance:02x}");
        }
    }

    #[test]
    fn test_optical_sfp_is_not_sgmii_candidate() {
        // 1000BASE-SX
        let fields = ModuleFields::parse(PortType::Sfp, &sfp_image(0x01, 0x03)).unwrap();
        assert!(!fields.may_support_sgmii());
    }

    #[test]
    fn test_short_sfp_image_is_truncated() {
        let err = SfpFields::parse(&[0u8; 64]).unwrap_err();
        assert_eq!(
            err,
            EepromError::Truncated {
                offset: sff8472::COMPLIANCE,
                needed: 1,
                available: 64
            }
        );
    }

    #[test]
    fn test_qsfp_fields_with_extended_compliance() {
        let mut data = vec![0u8; 256];
        data[sff8636::EXT_IDENTIFIER] = 0x04;
        data[sff8636::ETH_1040100G] = 0x80;
        data[sff8636::ETH_EXTENDED_COMP] = 0x0b;

        let fields = ModuleFields::parse(PortType::Qsfp, &data).unwrap();
        assert!(!fields.may_support_sgmii());
        assert_eq!(
            serde_json::to_value(fields).unwrap(),
            json!({
                "rx_cdr_present": true,
                "eeprom_eth_1040100g": 0x80,
                "eeprom_eth_extended_comp": 0x0b,
            })
        );
    }

    #[test]
    fn test_qsfp_extended_compliance_omitted_when_not_flagged() {
        let mut data = vec![0u8; 256];
        data[sff8636::ETH_1040100G] = 0x04;
        data[sff8636::ETH_EXTENDED_COMP] = 0x0b;

        let value = serde_json::to_value(QsfpFields::parse(&data).unwrap()).unwrap();
        assert_eq!(value, json!({"rx_cdr_present": false, "eeprom_eth_1040100g": 0x04}));
    }

    #[test]
    fn test_sfp_pages() {
        assert_eq!(sfp_pages(0x00), vec![0xa0]);
        assert_eq!(sfp_pages(0x40), vec![0xa0, 0xa2]);
        assert_eq!(sfp_pages(0x68), vec![0xa0, 0xa2]);
        assert_eq!(sfp_pages(0x44), vec![0xa0]);
    }

    #[test]
    fn test_monitor_windows() {
        assert_eq!(PortType::Sfp.monitor_window(), MonitorWindow { offset: 256, length: 128 });
        assert_eq!(PortType::Qsfp.monitor_window(), MonitorWindow { offset: 0, length: 128 });
    }
}
