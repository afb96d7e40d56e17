//! Command channel requests.
//!
//! A request is a JSON object with a `"command"` key naming one of
//! [`COMMANDS`] plus that command's fields. Numeric fields are accepted as
//! JSON numbers or decimal strings.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use sfp_eeprom::PortType;
use sfp_phy::{Capability, CapabilitySet, Duplex};

use crate::error::{Result, SfpdError};
use crate::state::{ExtraState, PresenceEvent};

/// Every command name the broker serves.
pub const COMMANDS: [&str; 10] = [
    "REPLAY",
    "PHYLINKSTATUS",
    "PHYSPEEDDUPLEXSET",
    "PHYAUTONEGSET",
    "SFPSTATESET",
    "SFPREADEEPROM",
    "SFPQUERYEEPROM",
    "SFPINSERTEDREMOVED",
    "SFPMONITORINTERVAL",
    "SFPMONITORTRIGGER",
];

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum Command {
    /// Full snapshot of every tracked port
    Replay,

    /// Link status of every tracked port's PHY
    PhyLinkStatus,

    /// Force speed and duplex
    PhySpeedDuplexSet {
        #[serde(rename = "portname")]
        port_name: String,
        #[serde(deserialize_with = "lenient_u32")]
        speed: u32,
        #[serde(deserialize_with = "duplex")]
        duplex: Duplex,
    },

    /// Enable autoneg; no `caps` advertises everything
    PhyAutonegSet {
        #[serde(rename = "portname")]
        port_name: String,
        #[serde(default, deserialize_with = "capabilities")]
        caps: Option<CapabilitySet>,
    },

    /// Enable or disable the transmitter
    SfpStateSet {
        #[serde(rename = "portname")]
        port_name: String,
        enabled: bool,
    },

    SfpReadEeprom {
        #[serde(rename = "portname")]
        port_name: String,
        #[serde(default, deserialize_with = "lenient_opt_usize")]
        offset: Option<usize>,
        #[serde(default, deserialize_with = "lenient_opt_usize")]
        length: Option<usize>,
    },

    SfpQueryEeprom {
        #[serde(rename = "portname")]
        port_name: String,
    },

    /// Synthetic presence event
    SfpInsertedRemoved {
        #[serde(rename = "portname")]
        port_name: String,
        #[serde(rename = "portid", deserialize_with = "lenient_u32")]
        port_index: u32,
        inserted: bool,
        #[serde(rename = "porttype", default = "default_port_type")]
        port_type: PortType,
        #[serde(default)]
        extra_state: ExtraState,
    },

    /// Monitor timer period in milliseconds, 0 stops it
    SfpMonitorInterval {
        #[serde(deserialize_with = "lenient_millis")]
        interval: Duration,
    },

    /// One monitoring pass
    SfpMonitorTrigger,
}

impl Command {
    /// Parses a request object.
    ///
    /// Anything without a string `"command"` is `bad command`; a name the
    /// broker does not serve is `unrecognised command <name>`.
    pub fn parse(request: &Value) -> Result<Self> {
        let name = request
            .as_object()
            .and_then(|obj| obj.get("command"))
            .and_then(Value::as_str)
            .ok_or_else(|| SfpdError::command("bad command"))?;

        if !COMMANDS.contains(&name) {
            return Err(SfpdError::command(format!("unrecognised command {name}")));
        }

        serde_json::from_value(request.clone())
            .map_err(|e| SfpdError::command(format!("bad {name} request: {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Replay => "REPLAY",
            Command::PhyLinkStatus => "PHYLINKSTATUS",
            Command::PhySpeedDuplexSet { .. } => "PHYSPEEDDUPLEXSET",
            Command::PhyAutonegSet { .. } => "PHYAUTONEGSET",
            Command::SfpStateSet { .. } => "SFPSTATESET",
            Command::SfpReadEeprom { .. } => "SFPREADEEPROM",
            Command::SfpQueryEeprom { .. } => "SFPQUERYEEPROM",
            Command::SfpInsertedRemoved { .. } => "SFPINSERTEDREMOVED",
            Command::SfpMonitorInterval { .. } => "SFPMONITORINTERVAL",
            Command::SfpMonitorTrigger => "SFPMONITORTRIGGER",
        }
    }

    /// The presence event carried by `SFPINSERTEDREMOVED`.
    pub fn presence_event(&self) -> Option<PresenceEvent> {
        match self {
            Command::SfpInsertedRemoved {
                port_name,
                port_index,
                inserted,
                port_type,
                extra_state,
            } => {
                let event = if *inserted {
                    PresenceEvent::inserted(port_name, *port_type, *port_index)
                } else {
                    PresenceEvent::removed(port_name, *port_type, *port_index)
                };
                Some(event.with_extra_state(extra_state.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_port_type() -> PortType {
    PortType::Sfp
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

impl Number {
    fn value<E: de::Error>(self) -> std::result::Result<u64, E> {
        match self {
            Number::Int(n) => Ok(n),
            Number::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid number '{s}'"))),
        }
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    let n = Number::deserialize(d)?.value::<D::Error>()?;
    u32::try_from(n).map_err(|_| de::Error::custom(format!("{n} out of range")))
}

fn lenient_opt_usize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<usize>, D::Error> {
    match Option::<Number>::deserialize(d)? {
        Some(n) => {
            let n = n.value::<D::Error>()?;
            usize::try_from(n)
                .map(Some)
                .map_err(|_| de::Error::custom(format!("{n} out of range")))
        }
        None => Ok(None),
    }
}

fn lenient_millis<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
    Ok(Duration::from_millis(Number::deserialize(d)?.value::<D::Error>()?))
}

fn duplex<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duplex, D::Error> {
    Ok(Duplex::from_request(&String::deserialize(d)?))
}

fn capabilities<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<CapabilitySet>, D::Error> {
    let Some(raw) = Option::<BTreeMap<String, bool>>::deserialize(d)? else {
        return Ok(None);
    };

    raw.into_iter()
        .map(|(name, on)| {
            name.parse::<Capability>()
                .map(|cap| (cap, on))
                .map_err(de::Error::custom)
        })
        .collect::<std::result::Result<CapabilitySet, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse(&json!({"command": "REPLAY"})).unwrap(), Command::Replay);
        assert_eq!(
            Command::parse(&json!({"command": "PHYLINKSTATUS"})).unwrap(),
            Command::PhyLinkStatus
        );
        assert_eq!(
            Command::parse(&json!({"command": "SFPMONITORTRIGGER"})).unwrap(),
            Command::SfpMonitorTrigger
        );
    }

    #[test]
    fn test_every_command_name_is_recognised() {
        for name in COMMANDS {
            let err = Command::parse(&json!({"command": name}));
            // Commands with required fields fail on fields, never on the name.
            if let Err(e) = err {
                assert!(e.to_string().starts_with(&format!("bad {name} request")), "{e}");
            }
        }
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse(&json!({"command": "UNKNOWN"})).unwrap_err();
        assert_eq!(err.to_string(), "unrecognised command UNKNOWN");
    }

    #[test]
    fn test_bad_command() {
        for request in [json!({}), json!([1, 2]), json!("REPLAY"), json!({"command": 7})] {
            let err = Command::parse(&request).unwrap_err();
            assert_eq!(err.to_string(), "bad command");
        }
    }

    #[test]
    fn test_speed_duplex() {
        let command = Command::parse(&json!({
            "command": "PHYSPEEDDUPLEXSET",
            "portname": "xe17",
            "speed": "100",
            "duplex": "half",
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::PhySpeedDuplexSet {
                port_name: "xe17".to_string(),
                speed: 100,
                duplex: Duplex::Half,
            }
        );

        let err = Command::parse(&json!({
            "command": "PHYSPEEDDUPLEXSET",
            "portname": "xe17",
            "duplex": "full",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("speed"));
    }

    #[test]
    fn test_autoneg_caps() {
        let command = Command::parse(&json!({"command": "PHYAUTONEGSET", "portname": "xe1"})).unwrap();
        assert_eq!(
            command,
            Command::PhyAutonegSet {
                port_name: "xe1".to_string(),
                caps: None,
            }
        );

        let command = Command::parse(&json!({
            "command": "PHYAUTONEGSET",
            "portname": "xe1",
            "caps": {"1000full": true, "100half": false},
        }))
        .unwrap();
        let Command::PhyAutonegSet { caps: Some(caps), .. } = command else {
            panic!("caps missing");
        };
        assert!(caps.get(Capability::Full1000));
        assert!(!caps.get(Capability::Half100));
        assert_eq!(caps.len(), 2);

        let err = Command::parse(&json!({
            "command": "PHYAUTONEGSET",
            "portname": "xe1",
            "caps": {"2500full": true},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("2500full"));
    }

    #[test]
    fn test_read_eeprom_optional_window() {
        let command = Command::parse(&json!({"command": "SFPREADEEPROM", "portname": "xe2"})).unwrap();
        assert_eq!(
            command,
            Command::SfpReadEeprom {
                port_name: "xe2".to_string(),
                offset: None,
                length: None,
            }
        );

        let command = Command::parse(&json!({
            "command": "SFPREADEEPROM",
            "portname": "xe2",
            "offset": "256",
            "length": 128,
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::SfpReadEeprom {
                port_name: "xe2".to_string(),
                offset: Some(256),
                length: Some(128),
            }
        );
    }

    #[test]
    fn test_inserted_removed() {
        let command = Command::parse(&json!({
            "command": "SFPINSERTEDREMOVED",
            "portname": "xe17",
            "portid": "17",
            "inserted": true,
        }))
        .unwrap();
        assert_eq!(
            command.presence_event().unwrap(),
            PresenceEvent::inserted("xe17", PortType::Sfp, 17)
        );

        let command = Command::parse(&json!({
            "command": "SFPINSERTEDREMOVED",
            "portname": "ce0",
            "portid": 0,
            "inserted": false,
            "porttype": "QSFP",
            "extra_state": {"note": "test"},
        }))
        .unwrap();
        let event = command.presence_event().unwrap();
        assert_eq!(event.port_type, PortType::Qsfp);
        assert!(!event.present);
        assert_eq!(event.extra_state["note"], json!("test"));

        assert!(Command::Replay.presence_event().is_none());
    }

    #[test]
    fn test_monitor_interval_milliseconds() {
        let command = Command::parse(&json!({"command": "SFPMONITORINTERVAL", "interval": 2500})).unwrap();
        assert_eq!(
            command,
            Command::SfpMonitorInterval {
                interval: Duration::from_millis(2500),
            }
        );
        assert!(Command::parse(&json!({"command": "SFPMONITORINTERVAL", "interval": -1})).is_err());
        assert!(Command::parse(&json!({"command": "SFPMONITORINTERVAL", "interval": "x"})).is_err());
    }

    #[test]
    fn test_display_is_wire_name() {
        assert_eq!(Command::SfpMonitorTrigger.to_string(), "SFPMONITORTRIGGER");
    }
}
