//! Testing utilities: an in-memory [`Platform`] and EEPROM image builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sfp_eeprom::sff::{sff8472, sff8636};
use sfp_eeprom::PortType;
use sfp_phy::test_utils::MockRegisterBus;
use sfp_phy::RegisterBus;

use crate::error::{Result, SfpdError};
use crate::platform::Platform;

type Slot = (PortType, u32);

#[derive(Debug, Default)]
struct MockPlatformState {
    eeproms: HashMap<Slot, Vec<u8>>,
    buses: HashMap<Slot, MockRegisterBus>,
    eeprom_reads: Vec<(Slot, usize, Option<usize>)>,
    sfp_states: Vec<(String, bool)>,
    sfp_state_absent: bool,
}

/// Platform with EEPROM images and PHY buses held in memory.
///
/// Clones share state, so a test can keep one while the broker owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    inner: Arc<Mutex<MockPlatformState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockPlatformState> {
        self.inner.lock().expect("mock platform lock poisoned")
    }

    pub fn insert_eeprom(&self, port_type: PortType, index: u32, image: Vec<u8>) {
        self.state().eeproms.insert((port_type, index), image);
    }

    pub fn remove_eeprom(&self, port_type: PortType, index: u32) {
        self.state().eeproms.remove(&(port_type, index));
    }

    /// Puts a PHY behind the port.
    pub fn attach_phy(&self, port_type: PortType, index: u32, bus: MockRegisterBus) {
        self.state().buses.insert((port_type, index), bus);
    }

    pub fn eeprom_reads(&self) -> Vec<(Slot, usize, Option<usize>)> {
        self.state().eeprom_reads.clone()
    }

    pub fn sfp_states(&self) -> Vec<(String, bool)> {
        self.state().sfp_states.clone()
    }

    /// Makes transmitter control report an empty cage.
    pub fn set_sfp_state_absent(&self, absent: bool) {
        self.state().sfp_state_absent = absent;
    }
}

impl Platform for MockPlatform {
    fn read_eeprom(
        &self,
        port_type: PortType,
        port_index: u32,
        offset: usize,
        length: Option<usize>,
    ) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.eeprom_reads.push(((port_type, port_index), offset, length));

        let image = state
            .eeproms
            .get(&(port_type, port_index))
            .ok_or(SfpdError::NotPresent)?;
        let start = offset.min(image.len());
        let end = length.map_or(image.len(), |len| (start + len).min(image.len()));
        Ok(image[start..end].to_vec())
    }

    fn acquire_bus(&self, port_type: PortType, port_index: u32) -> Result<Box<dyn RegisterBus + Send>> {
        let state = self.state();
        if !state.eeproms.contains_key(&(port_type, port_index)) {
            return Err(SfpdError::NotPresent);
        }

        let bus = state.buses.get(&(port_type, port_index)).cloned().unwrap_or_else(|| {
            // A module without a PHY: nothing answers at the PHY address.
            let bus = MockRegisterBus::new();
            bus.set_absent(true);
            bus
        });
        Ok(Box::new(bus))
    }

    fn set_sfp_state(&self, port_name: &str, enabled: bool) -> Result<()> {
        let mut state = self.state();
        if state.sfp_state_absent {
            return Err(SfpdError::NotPresent);
        }
        state.sfp_states.push((port_name.to_string(), enabled));
        Ok(())
    }
}

/// A 512-byte SFP image (A0h then A2h).
///
/// The A2h half counts up from 0 so monitor windows are recognisable.
pub fn sfp_image(eth_compat: u8, compliance: u8, dmt: u8) -> Vec<u8> {
    let mut image = vec![0u8; 512];
    image[sff8472::ETH_10G] = 0x10;
    image[sff8472::ETH_COMPAT] = eth_compat;
    image[sff8472::ETH_EXTENDED_COMP] = 0x00;
    image[sff8472::DMT] = dmt;
    image[sff8472::COMPLIANCE] = compliance;
    for (i, byte) in image[256..].iter_mut().enumerate() {
        *byte = i as u8;
    }
    image
}

/// A copper 1000BASE-T SFP with diagnostics.
pub fn copper_sfp_image() -> Vec<u8> {
    sfp_image(sff8472::ETH_1000BASE_T, 0x03, sff8472::DMT_IMPLEMENTED)
}

/// A 256-byte QSFP image.
pub fn qsfp_image(ext_identifier: u8, eth_1040100g: u8, eth_extended_comp: u8) -> Vec<u8> {
    let mut image = vec![0u8; 256];
    image[0] = 0x11;
    image[sff8636::EXT_IDENTIFIER] = ext_identifier;
    image[sff8636::ETH_1040100G] = eth_1040100g;
    image[sff8636::ETH_EXTENDED_COMP] = eth_extended_comp;
    image
}
