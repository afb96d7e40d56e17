//! ONIE TlvInfo decoding.
//!
//! Board identification EEPROMs hold an 11-byte header followed by a run
//! of type-length-value records:
//!
//! ```text
//! 0      7        8        9      11
//! +------+--------+--------+-------+------+------+-------+---
//! |TlvInfo\0      |version |total  | type | len  | value | ...
//! +------+--------+--------+-------+------+------+-------+---
//! ```
//!
//! `total` is the big-endian offset, from the start of the image, at which
//! the record walk stops. Type `0x00` never appears in a valid stream;
//! types this decoder does not know are skipped.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use tracing::debug;

use crate::error::{byte, slice, EepromError, Result};

/// Header magic, without its terminating NUL.
pub const MAGIC: &[u8; 7] = b"TlvInfo";
/// Offset of the big-endian end offset of the record walk.
pub const TOTAL_LEN_OFFSET: usize = 9;
/// Size of the header; records start here.
pub const HEADER_LEN: usize = 11;
/// Size of a record's type and length bytes.
pub const RECORD_HEADER_LEN: usize = 2;

/// Record type codes
pub mod tlv_type {
    /// Never valid
    pub const INVALID: u8 = 0x00;
    pub const PRODUCT_NAME: u8 = 0x21;
    pub const PART_NUMBER: u8 = 0x22;
    pub const SERIAL_NUMBER: u8 = 0x23;
    pub const BASE_MAC: u8 = 0x24;
    pub const MANUFACTURE_DATE: u8 = 0x25;
    pub const DEVICE_VERSION: u8 = 0x26;
    pub const LABEL_REVISION: u8 = 0x27;
    pub const PLATFORM_NAME: u8 = 0x28;
    pub const ONIE_VERSION: u8 = 0x29;
    pub const NUM_MACS: u8 = 0x2a;
    pub const MANUFACTURER: u8 = 0x2b;
    pub const COUNTRY_CODE: u8 = 0x2c;
    pub const VENDOR: u8 = 0x2d;
    pub const DIAG_VERSION: u8 = 0x2e;
    pub const SERVICE_TAG: u8 = 0x2f;
    pub const VENDOR_EXTENSION: u8 = 0xfd;
    pub const CRC_32: u8 = 0xfe;
}

/// One raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvRecord<'a> {
    /// Type code
    pub tlv_type: u8,
    /// Value bytes, `len` of them
    pub value: &'a [u8],
}

/// A decoded record value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TlvValue {
    /// Text, one character per byte
    Text(String),
    /// Colon separated lower-case hex, e.g. a MAC address
    Hex(String),
    /// Single byte integer
    Byte(u8),
    /// Big-endian 16-bit integer
    Short(u16),
    /// Big-endian 32-bit integer
    Int(u32),
    /// IANA enterprise number and the text that follows it
    VendorExtension(u32, String),
}

/// Vendor extension payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorExtension {
    /// IANA private enterprise number
    pub iana_number: u32,
    /// Remaining bytes as text
    pub text: String,
}

/// Board identity decoded from a TlvInfo EEPROM.
///
/// Fields absent from the EEPROM are `None`. When a type appears more than
/// once the last record wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlvInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacture_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onie_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_macs: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diag_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_extension: Option<VendorExtension>,
    #[serde(rename = "crc-32", skip_serializing_if = "Option::is_none")]
    pub crc32: Option<u32>,
}

impl TlvInfo {
    /// Decodes a TlvInfo EEPROM image.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut info = Self::default();
        for record in records(data)? {
            let Some((_, value)) = decode_record(&record)? else {
                continue;
            };
            info.apply(record.tlv_type, value);
        }
        Ok(info)
    }

    fn apply(&mut self, tlv_type: u8, value: TlvValue) {
        use tlv_type::*;

        match (tlv_type, value) {
            (PRODUCT_NAME, TlvValue::Text(s)) => self.product_name = Some(s),
            (PART_NUMBER, TlvValue::Text(s)) => self.part_number = Some(s),
            (SERIAL_NUMBER, TlvValue::Text(s)) => self.serial_number = Some(s),
            (BASE_MAC, TlvValue::Hex(s)) => self.base_mac = Some(s),
            (MANUFACTURE_DATE, TlvValue::Text(s)) => self.manufacture_date = Some(s),
            (DEVICE_VERSION, TlvValue::Byte(v)) => self.device_version = Some(v),
            (LABEL_REVISION, TlvValue::Text(s)) => self.label_revision = Some(s),
            (PLATFORM_NAME, TlvValue::Text(s)) => self.platform_name = Some(s),
            (ONIE_VERSION, TlvValue::Text(s)) => self.onie_version = Some(s),
            (NUM_MACS, TlvValue::Short(v)) => self.num_macs = Some(v),
            (MANUFACTURER, TlvValue::Text(s)) => self.manufacturer = Some(s),
            (COUNTRY_CODE, TlvValue::Text(s)) => self.country_code = Some(s),
            (VENDOR, TlvValue::Text(s)) => self.vendor = Some(s),
            (DIAG_VERSION, TlvValue::Text(s)) => self.diag_version = Some(s),
            (SERVICE_TAG, TlvValue::Text(s)) => self.service_tag = Some(s),
            (VENDOR_EXTENSION, TlvValue::VendorExtension(iana_number, text)) => {
                self.vendor_extension = Some(VendorExtension { iana_number, text })
            }
            (CRC_32, TlvValue::Int(v)) => self.crc32 = Some(v),
            _ => {}
        }
    }
}

/// Decodes a TlvInfo EEPROM image into a map keyed by field name.
///
/// Keys are `product_name`, `base_mac`, `crc-32` and so on; unknown
/// record types are left out.
pub fn decode(data: &[u8]) -> Result<BTreeMap<&'static str, TlvValue>> {
    let mut fields = BTreeMap::new();
    for record in records(data)? {
        if let Some((key, value)) = decode_record(&record)? {
            fields.insert(key, value);
        }
    }
    Ok(fields)
}

/// Validates the header and splits the records between the header and
/// `total` into raw records.
///
/// A record of type `0x00` is corruption; a record running past the end
/// of `data` is reported as truncation.
pub fn records(data: &[u8]) -> Result<Vec<TlvRecord<'_>>> {
    let magic = slice(data, 0, MAGIC.len())
        .map_err(|_| EepromError::corrupt("missing TlvInfo header"))?;
    if magic != MAGIC {
        return Err(EepromError::corrupt("bad TlvInfo header"));
    }

    let total_len = BigEndian::read_u16(slice(data, TOTAL_LEN_OFFSET, 2)?) as usize;

    let mut records = Vec::new();
    let mut cursor = HEADER_LEN;
    while cursor < total_len {
        let tlv_type = byte(data, cursor)?;
        if tlv_type == tlv_type::INVALID {
            return Err(EepromError::corrupt(format!(
                "invalid record type at offset {cursor}"
            )));
        }

        let len = byte(data, cursor + 1)? as usize;
        let value = slice(data, cursor + RECORD_HEADER_LEN, len)?;
        records.push(TlvRecord { tlv_type, value });

        cursor += len + RECORD_HEADER_LEN;
    }

    Ok(records)
}

/// Decodes one record per the type table; `None` for unknown types.
pub fn decode_record(record: &TlvRecord<'_>) -> Result<Option<(&'static str, TlvValue)>> {
    use tlv_type::*;

    let value = record.value;
    let decoded = match record.tlv_type {
        PRODUCT_NAME => ("product_name", TlvValue::Text(text(value))),
        PART_NUMBER => ("part_number", TlvValue::Text(text(value))),
        SERIAL_NUMBER => ("serial_number", TlvValue::Text(text(value))),
        BASE_MAC => ("base_mac", TlvValue::Hex(hex(value))),
        MANUFACTURE_DATE => ("manufacture_date", TlvValue::Text(text(value))),
        DEVICE_VERSION => ("device_version", TlvValue::Byte(byte(value, 0)?)),
        LABEL_REVISION => ("label_revision", TlvValue::Text(text(value))),
        PLATFORM_NAME => ("platform_name", TlvValue::Text(text(value))),
        ONIE_VERSION => ("onie_version", TlvValue::Text(text(value))),
        NUM_MACS => (
            "num_macs",
            TlvValue::Short(BigEndian::read_u16(slice(value, 0, 2)?)),
        ),
        MANUFACTURER => ("manufacturer", TlvValue::Text(text(value))),
        COUNTRY_CODE => ("country_code", TlvValue::Text(text(value))),
        VENDOR => ("vendor", TlvValue::Text(text(value))),
        DIAG_VERSION => ("diag_version", TlvValue::Text(text(value))),
        SERVICE_TAG => ("service_tag", TlvValue::Text(text(value))),
        VENDOR_EXTENSION => {
            let iana = BigEndian::read_u32(slice(value, 0, 4)?);
            (
                "vendor_extension",
                TlvValue::VendorExtension(iana, text(&value[4..])),
            )
        }
        CRC_32 => ("crc-32", TlvValue::Int(BigEndian::read_u32(slice(value, 0, 4)?))),
        other => {
            debug!(tlv_type = format_args!("0x{other:02x}"), "skipping unknown TLV");
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

fn text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Builds an image from `(type, value)` records.
    fn image(records: &[(u8, &[u8])]) -> Vec<u8> {
        let body: Vec<u8> = records
            .iter()
            .flat_map(|(t, v)| {
                let mut r = vec![*t, v.len() as u8];
                r.extend_from_slice(v);
                r
            })
            .collect();

        let mut data = MAGIC.to_vec();
        data.push(0);
        data.push(0x01);
        data.extend_from_slice(&((HEADER_LEN + body.len()) as u16).to_be_bytes());
        data.extend(body);
        data
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut data = image(&[(tlv_type::PRODUCT_NAME, b"S9500")]);
        data[0] = b't';
        assert!(matches!(decode(&data), Err(EepromError::Corrupt(_))));
        assert!(matches!(TlvInfo::decode(&[0xff; 64]), Err(EepromError::Corrupt(_))));
        assert!(matches!(decode(b"Tlv"), Err(EepromError::Corrupt(_))));
    }

    #[test]
    fn test_string_of_length_five() {
        let data = image(&[(tlv_type::PRODUCT_NAME, b"S9500")]);
        let fields = decode(&data).unwrap();
        assert_eq!(fields.get("product_name"), Some(&TlvValue::Text("S9500".to_string())));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_vendor_extension_splits_iana_and_text() {
        let data = image(&[(tlv_type::VENDOR_EXTENSION, &[0x00, 0x00, 0x67, 0x2b, b'v', b'y', b'a', b't'])]);
        let fields = decode(&data).unwrap();
        assert_eq!(
            fields.get("vendor_extension"),
            Some(&TlvValue::VendorExtension(0x672b, "vyat".to_string()))
        );

        let info = TlvInfo::decode(&data).unwrap();
        assert_eq!(
            info.vendor_extension,
            Some(VendorExtension {
                iana_number: 26411,
                text: "vyat".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_type_is_corrupt() {
        let data = image(&[(tlv_type::PRODUCT_NAME, b"x"), (tlv_type::INVALID, b"")]);
        let err = decode(&data).unwrap_err();
        assert_eq!(err, EepromError::corrupt("invalid record type at offset 14"));
    }

    #[test]
    fn test_unknown_types_are_skipped() {
        let data = image(&[(0x80, b"junk"), (tlv_type::SERIAL_NUMBER, b"AB123")]);
        let fields = decode(&data).unwrap();
        assert_eq!(fields.keys().copied().collect::<Vec<_>>(), vec!["serial_number"]);
        assert_eq!(records(&data).unwrap().len(), 2);
    }

    #[test]
    fn test_full_board_identity() {
        let data = image(&[
            (tlv_type::PRODUCT_NAME, b"S9500-30XS"),
            (tlv_type::PART_NUMBER, b"PN-1"),
            (tlv_type::SERIAL_NUMBER, b"SN0042"),
            (tlv_type::BASE_MAC, &[0x00, 0x1b, 0x21, 0xaa, 0xbb, 0x0c]),
            (tlv_type::MANUFACTURE_DATE, b"01/02/2020 10:00:00"),
            (tlv_type::DEVICE_VERSION, &[3]),
            (tlv_type::NUM_MACS, &[0x01, 0x00]),
            (tlv_type::COUNTRY_CODE, b"TW"),
            (tlv_type::CRC_32, &[0xde, 0xad, 0xbe, 0xef]),
        ]);

        let info = TlvInfo::decode(&data).unwrap();
        assert_eq!(info.product_name.as_deref(), Some("S9500-30XS"));
        assert_eq!(info.base_mac.as_deref(), Some("00:1b:21:aa:bb:0c"));
        assert_eq!(info.device_version, Some(3));
        assert_eq!(info.num_macs, Some(256));
        assert_eq!(info.crc32, Some(0xdead_beef));
        assert_eq!(info.vendor, None);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["crc-32"], 0xdead_beef_u32);
        assert_eq!(json["num_macs"], 256);
        assert!(json.get("vendor").is_none());
    }

    #[test]
    fn test_map_serializes_like_typed_form() {
        let data = image(&[
            (tlv_type::PLATFORM_NAME, b"x86_64-s9500"),
            (tlv_type::VENDOR_EXTENSION, &[0, 0, 0, 1, b'a', b'b']),
        ]);
        let json = serde_json::to_value(decode(&data).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "platform_name": "x86_64-s9500",
                "vendor_extension": [1, "ab"],
            })
        );
    }

    #[test]
    fn test_image_ending_at_total_len() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[0x00, 0x01, 0x00, 18]);
        data.extend_from_slice(&[tlv_type::PRODUCT_NAME, 5]);
        data.extend_from_slice(b"S9500");
        assert_eq!(data.len(), 18);

        let info = TlvInfo::decode(&data).unwrap();
        assert_eq!(info.product_name.as_deref(), Some("S9500"));
        assert_eq!(records(&data).unwrap().len(), 1);
    }

    #[test]
    fn test_walk_stops_at_total_len() {
        let mut data = image(&[(tlv_type::VENDOR, b"acme")]);
        // A record past the end offset is never reached.
        data.extend_from_slice(&[tlv_type::SERVICE_TAG, 2, b'x', b'y']);
        let fields = decode(&data).unwrap();
        assert_eq!(fields.keys().copied().collect::<Vec<_>>(), vec!["vendor"]);
    }

    #[test]
    fn test_record_past_data_is_truncated() {
        let mut data = image(&[(tlv_type::PRODUCT_NAME, b"S9500")]);
        // Claim a longer value than the image holds.
        data[HEADER_LEN + 1] = 9;
        assert!(matches!(decode(&data), Err(EepromError::Truncated { .. })));
    }

    #[test]
    fn test_total_len_past_data_is_truncated() {
        let mut data = image(&[(tlv_type::PRODUCT_NAME, b"S9500")]);
        data.truncate(data.len() - 2);
        assert!(matches!(decode(&data), Err(EepromError::Truncated { .. })));
    }

    #[test]
    fn test_trailing_bytes_after_total_len_ignored() {
        let mut data = image(&[(tlv_type::VENDOR, b"acme")]);
        data.extend_from_slice(&[0x00, 0xff, 0xff]);
        let info = TlvInfo::decode(&data).unwrap();
        assert_eq!(info.vendor.as_deref(), Some("acme"));
    }

    #[test]
    fn test_short_integer_fields_are_truncated() {
        let data = image(&[(tlv_type::CRC_32, &[0x01, 0x02])]);
        assert!(matches!(decode(&data), Err(EepromError::Truncated { .. })));
    }

    #[test]
    fn test_empty_region() {
        let data = image(&[]);
        assert!(decode(&data).unwrap().is_empty());
        assert_eq!(TlvInfo::decode(&data).unwrap(), TlvInfo::default());
    }
}
