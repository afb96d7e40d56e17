//! Transceiver state broker.
//!
//! The broker owns the port name to [`TransceiverRecord`] table and is its
//! only writer. Presence changes and command requests are both applied
//! here, one at a time, on the command thread (see [`crate::service`]).
//! Every presence change publishes that port's delta on the `sfp` topic;
//! every monitoring pass publishes one binary frame on `sfpmonitor`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use sfp_eeprom::sff::{sff8472, sff8636};
use sfp_eeprom::{sfp_pages, ModuleFields, PortType};
use sfp_phy::{CapabilitySet, PhyDirectory};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::command::Command;
use crate::error::{Result, SfpdError};
use crate::monitor::{MonitorEntry, MonitorFrame, MonitorMessage, MonitorTimer};
use crate::phy_ops::{self, ProbePolicy};
use crate::platform::Platform;
use crate::state::{ExtraState, PresenceEvent, StateTable, TransceiverRecord};

/// Topic of presence notifications.
pub const NOTIFY_TOPIC: &str = "sfp";

/// Extra-state key set when SGMII was enabled on insertion.
pub const SGMII_ENABLED: &str = "sgmii_enabled";

const CHANNEL_CAPACITY: usize = 64;

/// A presence notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: &'static str,
    /// JSON `{"ports": {<name>: {...}}}`
    pub payload: String,
}

impl Notification {
    pub fn new(payload: String) -> Self {
        Self {
            topic: NOTIFY_TOPIC,
            payload,
        }
    }

    /// Wire form: topic, a space, the payload.
    pub fn line(&self) -> String {
        format!("{} {}", self.topic, self.payload)
    }
}

fn ok() -> Value {
    json!({"result": "OK"})
}

/// Single-writer transceiver state.
pub struct Broker<P: Platform> {
    platform: P,
    directory: PhyDirectory,
    probe: ProbePolicy,
    table: StateTable,
    notifications: broadcast::Sender<Notification>,
    monitor: broadcast::Sender<MonitorMessage>,
    timer: Option<MonitorTimer>,
}

impl<P: Platform> Broker<P> {
    pub fn new(platform: P) -> Self {
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (monitor, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            platform,
            directory: PhyDirectory::standard(),
            probe: ProbePolicy::default(),
            table: StateTable::new(),
            notifications,
            monitor,
            timer: None,
        }
    }

    pub fn with_directory(mut self, directory: PhyDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_probe_policy(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    /// Attaches the timer driven by `SFPMONITORINTERVAL`.
    pub fn set_timer(&mut self, timer: MonitorTimer) {
        self.timer = Some(timer);
    }

    pub fn table(&self) -> &StateTable {
        &self.table
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn subscribe_monitor(&self) -> broadcast::Receiver<MonitorMessage> {
        self.monitor.subscribe()
    }

    pub(crate) fn notification_sender(&self) -> broadcast::Sender<Notification> {
        self.notifications.clone()
    }

    pub(crate) fn monitor_sender(&self) -> broadcast::Sender<MonitorMessage> {
        self.monitor.clone()
    }

    /// Applies a presence change and publishes the port's delta.
    ///
    /// An inserted module with no supplied extra state has its
    /// identification prefix read and classified; SGMII is enabled when the
    /// module may carry a PHY. Neither step can block the presence update.
    #[instrument(skip(self, event), fields(port = %event.port_name, present = event.present))]
    pub fn on_presence_change(&mut self, event: PresenceEvent) -> Result<()> {
        let PresenceEvent {
            port_name,
            port_type,
            port_index,
            present,
            mut extra_state,
        } = event;

        if present && extra_state.is_empty() {
            extra_state = self.derive_extra_state(port_type, port_index);
        }

        let record = TransceiverRecord::new(port_type, port_index, extra_state)?;
        let delta = record.delta(&port_name, present);

        if present {
            self.table.insert(port_name, record);
        } else if self.table.remove(&port_name).is_none() {
            debug!("removal of untracked port");
        }

        info!(tracked = self.table.len(), "presence updated");
        // No subscribers is not an error.
        let _ = self
            .notifications
            .send(Notification::new(Value::Object(delta).to_string()));
        Ok(())
    }

    fn derive_extra_state(&self, port_type: PortType, port_index: u32) -> ExtraState {
        let mut extra_state = ExtraState::new();

        let data = match self
            .platform
            .read_eeprom(port_type, port_index, 0, Some(port_type.identity_len()))
        {
            Ok(data) => data,
            Err(e) => {
                if e.is_not_present() {
                    debug!("module gone before EEPROM read");
                } else {
                    warn!(error = %e, "EEPROM read failed");
                }
                return extra_state;
            }
        };

        let fields = match ModuleFields::parse(port_type, &data) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "EEPROM fields not decodable");
                return extra_state;
            }
        };

        match serde_json::to_value(fields) {
            Ok(Value::Object(map)) => extra_state.extend(map),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "EEPROM fields not serializable"),
        }

        if fields.may_support_sgmii()
            && phy_ops::set_sgmii_enabled(
                &self.platform,
                &self.directory,
                &self.probe,
                port_type,
                port_index,
            )
        {
            extra_state.insert(SGMII_ENABLED.to_string(), Value::Bool(true));
        }

        extra_state
    }

    /// Every tracked record under `"ports"`; `{}` when nothing is tracked.
    pub fn snapshot(&self) -> ExtraState {
        self.table.snapshot()
    }

    /// Serves one request. Always returns exactly one reply object.
    #[instrument(skip_all)]
    pub fn handle_request(&mut self, request: &Value) -> Value {
        let command = match Command::parse(request) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "rejected request");
                return json!({"result": e.to_string()});
            }
        };

        debug!(%command, "request");
        match self.dispatch(&command) {
            Ok(reply) => reply,
            Err(e) => {
                if matches!(e, SfpdError::State { .. }) {
                    error!(%command, error = %e, "record invariant violated");
                } else {
                    warn!(%command, error = %e, "request failed");
                }
                json!({"result": e.to_string()})
            }
        }
    }

    fn dispatch(&mut self, command: &Command) -> Result<Value> {
        match command {
            Command::Replay => {
                let mut reply = self.snapshot();
                reply.insert("result".to_string(), json!("OK"));
                Ok(Value::Object(reply))
            }

            Command::PhyLinkStatus => {
                let mut links = serde_json::Map::new();
                for (name, record) in self.table.iter() {
                    let status = phy_ops::phy_link_status(
                        &self.platform,
                        &self.directory,
                        record.port_type(),
                        record.port_index(),
                    );
                    links.insert(
                        name.to_string(),
                        json!({
                            "link": status.state.as_str(),
                            "speed": status.speed_mbps,
                            "duplex": status.duplex.as_str(),
                        }),
                    );
                }
                Ok(json!({"result": "OK", "phy_links": links}))
            }

            Command::PhySpeedDuplexSet {
                port_name,
                speed,
                duplex,
            } => {
                let (port_type, port_index) = self.tracked(port_name)?;
                let result = phy_ops::set_phy_speed_duplex(
                    &self.platform,
                    &self.directory,
                    port_type,
                    port_index,
                    *speed,
                    *duplex,
                );
                Self::ack_phy(port_name, result)
            }

            Command::PhyAutonegSet { port_name, caps } => {
                let (port_type, port_index) = self.tracked(port_name)?;
                let caps = caps.clone().unwrap_or_else(CapabilitySet::all);
                let result = phy_ops::set_phy_autoneg(
                    &self.platform,
                    &self.directory,
                    port_type,
                    port_index,
                    &caps,
                );
                Self::ack_phy(port_name, result)
            }

            Command::SfpStateSet { port_name, enabled } => {
                match self.platform.set_sfp_state(port_name, *enabled) {
                    Ok(()) => {}
                    // The client re-issues the request once a module is back.
                    Err(e) if e.is_not_present() => {
                        debug!(port = %port_name, "transmitter state set on empty cage")
                    }
                    Err(e) => return Err(e),
                }
                Ok(ok())
            }

            Command::SfpReadEeprom {
                port_name,
                offset,
                length,
            } => {
                let (port_type, port_index) = self.tracked(port_name)?;
                let data =
                    self.platform
                        .read_eeprom(port_type, port_index, offset.unwrap_or(0), *length)?;
                Ok(json!({"result": "OK", "data": BASE64.encode(data)}))
            }

            Command::SfpQueryEeprom { port_name } => {
                let (port_type, port_index) = self.tracked(port_name)?;
                let pages = match port_type {
                    PortType::Sfp => {
                        let dmt = self.platform.read_eeprom(
                            port_type,
                            port_index,
                            sff8472::DMT,
                            Some(1),
                        )?;
                        sfp_pages(dmt.first().copied().ok_or(SfpdError::NotPresent)?)
                    }
                    PortType::Qsfp => sff8636::PAGES.to_vec(),
                };
                Ok(json!({"result": "OK", "porttype": port_type.as_str(), "pages": pages}))
            }

            Command::SfpInsertedRemoved { .. } => {
                if let Some(event) = command.presence_event() {
                    self.on_presence_change(event)?;
                }
                Ok(ok())
            }

            Command::SfpMonitorInterval { interval } => {
                let timer = self
                    .timer
                    .as_mut()
                    .ok_or_else(|| SfpdError::command("monitoring not available"))?;
                timer.set_interval(*interval);
                Ok(ok())
            }

            Command::SfpMonitorTrigger => {
                let entries = self.monitor_pass()?;
                Ok(json!({"result": "OK", "entries": entries}))
            }
        }
    }

    /// Type and index of a tracked port; an untracked port has no module.
    fn tracked(&self, port_name: &str) -> Result<(PortType, u32)> {
        self.table
            .get(port_name)
            .map(|record| (record.port_type(), record.port_index()))
            .ok_or(SfpdError::NotPresent)
    }

    fn ack_phy(port_name: &str, result: Result<()>) -> Result<Value> {
        match result {
            Ok(()) => Ok(ok()),
            Err(e) if e.is_phy_absent() => {
                debug!(port = %port_name, error = %e, "no PHY to configure");
                Ok(ok())
            }
            Err(e) => Err(e),
        }
    }

    /// Reads every tracked port's monitor window and publishes one frame.
    /// Ports whose read fails are left out. Returns the entry count.
    pub fn monitor_pass(&self) -> Result<usize> {
        let mut frame = MonitorFrame::default();

        for (name, record) in self.table.iter() {
            let port_type = record.port_type();
            let window = port_type.monitor_window();
            match self.platform.read_eeprom(
                port_type,
                record.port_index(),
                usize::from(window.offset),
                Some(usize::from(window.length)),
            ) {
                Ok(data) => frame.entries.push(MonitorEntry {
                    name: name.to_string(),
                    port_type,
                    offset: window.offset,
                    data,
                }),
                Err(e) => debug!(port = %name, error = %e, "monitor read skipped"),
            }
        }

        let entries = frame.entries.len();
        let payload = frame.encode()?;
        let _ = self.monitor.send(MonitorMessage::new(payload));
        debug!(entries, "monitor pass");
        Ok(entries)
    }
}
