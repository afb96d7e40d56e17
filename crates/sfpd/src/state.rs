//! Transceiver records and snapshot merging.
//!
//! Each tracked port has one [`TransceiverRecord`]. Its published form is
//! a JSON object carrying `present`, `type`, `port` and every extra-state
//! key. Those three keys are reserved: extra state may not claim a
//! different value for them, which keeps records conflict free once built.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use sfp_eeprom::PortType;

use crate::error::{Result, SfpdError};

const PRESENT: &str = "present";
const TYPE: &str = "type";
const PORT: &str = "port";
const PORTS: &str = "ports";

/// Open-ended per-port fields: EEPROM-derived values, `sgmii_enabled`,
/// and anything a caller supplied.
pub type ExtraState = Map<String, Value>;

/// A module was inserted into or removed from a port.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEvent {
    pub port_name: String,
    pub port_type: PortType,
    pub port_index: u32,
    pub present: bool,
    pub extra_state: ExtraState,
}

impl PresenceEvent {
    pub fn inserted(port_name: impl Into<String>, port_type: PortType, port_index: u32) -> Self {
        Self {
            port_name: port_name.into(),
            port_type,
            port_index,
            present: true,
            extra_state: ExtraState::new(),
        }
    }

    pub fn removed(port_name: impl Into<String>, port_type: PortType, port_index: u32) -> Self {
        Self {
            present: false,
            ..Self::inserted(port_name, port_type, port_index)
        }
    }

    /// Replaces the extra state carried by the event.
    pub fn with_extra_state(mut self, extra_state: ExtraState) -> Self {
        self.extra_state = extra_state;
        self
    }
}

/// State of one present transceiver.
#[derive(Debug, Clone, PartialEq)]
pub struct TransceiverRecord {
    port_type: PortType,
    port_index: u32,
    extra_state: ExtraState,
}

impl TransceiverRecord {
    /// Builds a record. Extra state may repeat `type` or `port`, but only
    /// with the record's own value; `present` belongs to the broker.
    pub fn new(port_type: PortType, port_index: u32, extra_state: ExtraState) -> Result<Self> {
        let record = Self {
            port_type,
            port_index,
            extra_state,
        };

        if record.extra_state.contains_key(PRESENT) {
            return Err(SfpdError::conflict(PRESENT));
        }
        for (key, value) in record.identity() {
            if record.extra_state.get(key).is_some_and(|given| *given != value) {
                return Err(SfpdError::conflict(key));
            }
        }
        Ok(record)
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn port_index(&self) -> u32 {
        self.port_index
    }

    pub fn extra_state(&self) -> &ExtraState {
        &self.extra_state
    }

    fn identity(&self) -> [(&'static str, Value); 2] {
        [
            (TYPE, json!(self.port_type.as_str())),
            (PORT, json!(self.port_index)),
        ]
    }

    /// Published form of the record: `present`, the extra state, then
    /// `type` and `port`.
    pub fn to_json(&self, present: bool) -> ExtraState {
        let mut out = ExtraState::new();
        out.insert(PRESENT.to_string(), Value::Bool(present));
        out.extend(self.extra_state.clone());
        for (key, value) in self.identity() {
            out.insert(key.to_string(), value);
        }
        out
    }

    /// `{"ports": {<name>: <record>}}` for one port.
    pub fn delta(&self, port_name: &str, present: bool) -> ExtraState {
        let mut ports = ExtraState::new();
        ports.insert(port_name.to_string(), Value::Object(self.to_json(present)));
        wrap_ports(ports)
    }
}

fn wrap_ports(ports: ExtraState) -> ExtraState {
    let mut out = ExtraState::new();
    out.insert(PORTS.to_string(), Value::Object(ports));
    out
}

/// The authoritative port name to record map.
#[derive(Debug, Default)]
pub struct StateTable {
    records: BTreeMap<String, TransceiverRecord>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `port_name`.
    pub fn insert(&mut self, port_name: impl Into<String>, record: TransceiverRecord) {
        self.records.insert(port_name.into(), record);
    }

    /// Deletes the record for `port_name`, returning it if it existed.
    pub fn remove(&mut self, port_name: &str) -> Option<TransceiverRecord> {
        self.records.remove(port_name)
    }

    pub fn get(&self, port_name: &str) -> Option<&TransceiverRecord> {
        self.records.get(port_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransceiverRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record under `{"ports": {...}}`. An empty table gives an
    /// empty object.
    pub fn snapshot(&self) -> ExtraState {
        if self.records.is_empty() {
            return ExtraState::new();
        }

        let ports = self
            .records
            .iter()
            .map(|(name, record)| (name.clone(), Value::Object(record.to_json(true))))
            .collect();
        wrap_ports(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extra(value: Value) -> ExtraState {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_record_json() {
        let record = TransceiverRecord::new(
            PortType::Sfp,
            17,
            extra(json!({"eeprom_eth_compat": 8, "sgmii_enabled": true})),
        )
        .unwrap();

        assert_eq!(
            Value::Object(record.to_json(true)),
            json!({
                "present": true,
                "type": "SFP",
                "port": 17,
                "eeprom_eth_compat": 8,
                "sgmii_enabled": true,
            })
        );
    }

    #[test]
    fn test_record_accepts_matching_identity() {
        let record =
            TransceiverRecord::new(PortType::Qsfp, 2, extra(json!({"type": "QSFP", "port": 2})));
        assert!(record.is_ok());
    }

    #[test]
    fn test_record_rejects_conflicting_identity() {
        let err = TransceiverRecord::new(PortType::Sfp, 17, extra(json!({"port": 18}))).unwrap_err();
        assert!(matches!(err, SfpdError::State { ref path } if path == "port"));

        let err = TransceiverRecord::new(PortType::Sfp, 17, extra(json!({"type": "QSFP"}))).unwrap_err();
        assert!(matches!(err, SfpdError::State { .. }));
    }

    #[test]
    fn test_record_rejects_presence_in_extra_state() {
        let err = TransceiverRecord::new(PortType::Sfp, 1, extra(json!({"present": true})))
            .unwrap_err();
        assert!(matches!(err, SfpdError::State { ref path } if path == "present"));
    }

    #[test]
    fn test_nested_extra_state_is_published_as_given() {
        let record = TransceiverRecord::new(
            PortType::Sfp,
            4,
            extra(json!({"vendor": {"name": "acme", "pn": "X1"}})),
        )
        .unwrap();
        assert_eq!(
            record.to_json(false)["vendor"],
            json!({"name": "acme", "pn": "X1"})
        );
    }

    #[test]
    fn test_snapshot_holds_every_port() {
        let mut table = StateTable::new();
        table.insert("xe1", TransceiverRecord::new(PortType::Sfp, 1, ExtraState::new()).unwrap());
        table.insert(
            "xe2",
            TransceiverRecord::new(PortType::Qsfp, 2, extra(json!({"rx_cdr_present": true})))
                .unwrap(),
        );

        assert_eq!(
            Value::Object(table.snapshot()),
            json!({"ports": {
                "xe1": {"present": true, "type": "SFP", "port": 1},
                "xe2": {"present": true, "type": "QSFP", "port": 2, "rx_cdr_present": true},
            }})
        );
    }

    #[test]
    fn test_snapshot_insert_then_remove() {
        let mut table = StateTable::new();
        assert_eq!(Value::Object(table.snapshot()), json!({}));

        table.insert(
            "xe17",
            TransceiverRecord::new(PortType::Sfp, 17, ExtraState::new()).unwrap(),
        );
        let snapshot = table.snapshot();
        let ports = snapshot["ports"].as_object().unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports["xe17"]["present"], json!(true));

        assert!(table.remove("xe17").is_some());
        assert!(table.remove("xe17").is_none());
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn test_delta_shape() {
        let record = TransceiverRecord::new(PortType::Sfp, 19, ExtraState::new()).unwrap();
        assert_eq!(
            Value::Object(record.delta("xe19", false)),
            json!({"ports": {"xe19": {"present": false, "type": "SFP", "port": 19}}})
        );
    }

    #[test]
    fn test_presence_event_builders() {
        let event = PresenceEvent::removed("xe3", PortType::Sfp, 3);
        assert!(!event.present);
        assert!(event.extra_state.is_empty());
        assert_eq!(event.port_name, "xe3");
    }
}
