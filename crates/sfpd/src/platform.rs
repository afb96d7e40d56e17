//! Platform access to transceiver cages.
//!
//! [`Platform`] is everything the broker needs from the hardware: EEPROM
//! reads, a register bus per port for PHY access, and transmitter control.
//! [`SysfsPlatform`] implements it over per-port files as exposed by the
//! kernel's optoe driver and GPIO or CPLD attributes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sfp_eeprom::PortType;
use sfp_phy::RegisterBus;
use tracing::{debug, info};

use crate::config_file::PortConfig;
use crate::error::{Result, SfpdError};
use crate::state::PresenceEvent;

/// Hardware access used by the broker.
pub trait Platform {
    /// Reads `length` bytes from `offset` of the module's EEPROM image;
    /// `None` reads to the end of the image.
    ///
    /// An empty cage is [`SfpdError::NotPresent`].
    fn read_eeprom(
        &self,
        port_type: PortType,
        port_index: u32,
        offset: usize,
        length: Option<usize>,
    ) -> Result<Vec<u8>>;

    /// Hands out a register bus for one PHY operation. The caller drops
    /// it when the operation is done.
    fn acquire_bus(&self, port_type: PortType, port_index: u32) -> Result<Box<dyn RegisterBus + Send>>;

    /// Enables or disables a port's transmitter.
    fn set_sfp_state(&self, port_name: &str, enabled: bool) -> Result<()>;
}

/// File-backed platform.
///
/// SFP images are A0h followed by A2h; QSFP images are the lower page
/// followed by the upper pages.
#[derive(Debug, Clone)]
pub struct SysfsPlatform {
    ports: Vec<PortConfig>,
}

impl SysfsPlatform {
    pub fn new(ports: Vec<PortConfig>) -> Self {
        Self { ports }
    }

    pub fn ports(&self) -> &[PortConfig] {
        &self.ports
    }

    fn port(&self, port_type: PortType, port_index: u32) -> Result<&PortConfig> {
        self.ports
            .iter()
            .find(|p| p.port_type == port_type && p.index == port_index)
            .ok_or_else(|| SfpdError::command(format!("no {port_type} port {port_index}")))
    }

    fn port_by_name(&self, port_name: &str) -> Result<&PortConfig> {
        self.ports
            .iter()
            .find(|p| p.name == port_name)
            .ok_or_else(|| SfpdError::command(format!("unknown port {port_name}")))
    }

    /// Whether a module sits in the cage.
    pub fn is_present(port: &PortConfig) -> bool {
        match &port.presence_path {
            Some(path) => fs::read_to_string(path)
                .map(|s| s.trim() == "1")
                .unwrap_or(false),
            None => port.eeprom_path.exists(),
        }
    }

    /// Compares every port's presence against `last` and returns the
    /// changes as events. Ports never seen present raise no removal.
    pub fn poll_presence(&self, last: &mut HashMap<String, bool>) -> Vec<PresenceEvent> {
        let mut events = Vec::new();
        for port in &self.ports {
            let present = Self::is_present(port);
            let previous = last.insert(port.name.clone(), present);
            if previous == Some(present) || (previous.is_none() && !present) {
                continue;
            }

            info!(port = %port.name, present, "presence changed");
            events.push(if present {
                PresenceEvent::inserted(&port.name, port.port_type, port.index)
            } else {
                PresenceEvent::removed(&port.name, port.port_type, port.index)
            });
        }
        events
    }

    fn open_eeprom(path: &Path) -> Result<File> {
        File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SfpdError::NotPresent,
            _ => SfpdError::Io(e),
        })
    }
}

impl Platform for SysfsPlatform {
    fn read_eeprom(
        &self,
        port_type: PortType,
        port_index: u32,
        offset: usize,
        length: Option<usize>,
    ) -> Result<Vec<u8>> {
        let port = self.port(port_type, port_index)?;
        if !Self::is_present(port) {
            return Err(SfpdError::NotPresent);
        }

        let mut file = Self::open_eeprom(&port.eeprom_path)?;
        file.seek(SeekFrom::Start(offset as u64))?;

        let mut data = Vec::new();
        match length {
            Some(length) => {
                file.take(length as u64).read_to_end(&mut data)?;
            }
            None => {
                file.read_to_end(&mut data)?;
            }
        }

        debug!(port = %port.name, offset, len = data.len(), "EEPROM read");
        Ok(data)
    }

    fn acquire_bus(&self, port_type: PortType, port_index: u32) -> Result<Box<dyn RegisterBus + Send>> {
        Err(SfpdError::bus_not_supported(format!("{port_type} {port_index}")))
    }

    fn set_sfp_state(&self, port_name: &str, enabled: bool) -> Result<()> {
        let port = self.port_by_name(port_name)?;
        let Some(path) = &port.tx_disable_path else {
            debug!(port = %port_name, enabled, "no transmitter control for port");
            return Ok(());
        };

        if !Self::is_present(port) {
            return Err(SfpdError::NotPresent);
        }

        fs::write(path, if enabled { "0" } else { "1" })?;
        info!(port = %port_name, enabled, "transmitter state set");
        Ok(())
    }
}
