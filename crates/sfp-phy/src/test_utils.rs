//! Testing utilities and mock implementations
//!
//! [`MockRegisterBus`] simulates a PHY's register file behind a
//! [`RegisterBus`] so the driver can be exercised without hardware. Values
//! handed to and taken from the test API are in register order; the mock
//! applies the wire conversion itself, the way real hardware would appear.
//!
//! Clones share the same register file, so a platform mock can hand out a
//! clone per operation while the test keeps one for inspection.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bus::{from_wire, to_wire, RegisterBus};
use crate::error::BusError;
use crate::regs::{ctrl, reg, PHY_ADDR};

#[derive(Debug)]
struct MockState {
    /// Register values: (addr, reg) -> value, register order
    registers: HashMap<(u8, u8), u16>,
    /// Record of writes: (addr, reg, value), register order
    writes: Vec<(u8, u8, u16)>,
    /// Record of reads: (addr, reg)
    reads: Vec<(u8, u8)>,
    /// Bits that stay set whatever is written
    stuck: HashMap<(u8, u8), u16>,
    /// Every access reports "no device"
    absent: bool,
    /// Every access fails with this I/O error message
    io_failure: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            registers: HashMap::new(),
            writes: Vec::new(),
            reads: Vec::new(),
            stuck: HashMap::new(),
            absent: false,
            io_failure: None,
        }
    }
}

/// Mock register bus for testing PHY drivers without hardware.
///
/// # Example
///
/// ```ignore
/// let bus = MockRegisterBus::with_marvell_88e1111();
/// let mut phy = PhyDirectory::standard().identify(&mut bus.clone()).unwrap();
/// phy.enable_sgmii(&mut bus.clone()).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRegisterBus {
    inner: Arc<Mutex<MockState>>,
}

impl MockRegisterBus {
    /// Marvell 88E1111 revision 2 identifier words.
    pub const MARVELL_ID1: u16 = 0x0141;
    pub const MARVELL_ID2: u16 = 0x0cc2;

    /// Create an empty bus; unset registers read as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus with an 88E1111 answering at the SFP PHY address.
    pub fn with_marvell_88e1111() -> Self {
        let bus = Self::new();
        bus.set_register(PHY_ADDR, reg::PHYID1, Self::MARVELL_ID1);
        bus.set_register(PHY_ADDR, reg::PHYID2, Self::MARVELL_ID2);
        bus.set_register(PHY_ADDR, reg::CTRL, 0x1140);
        // HWCFG_MODE = 1000BASE-X, plus unrelated bits that must survive.
        bus.set_register(PHY_ADDR, reg::EXT_PHY_STATUS, 0x0488);
        bus.set_register(PHY_ADDR, reg::AUTONEG_ADV, 0x01e1);
        bus.set_register(PHY_ADDR, reg::GIGE_CTRL, 0x0e00);
        bus
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().expect("mock bus lock poisoned")
    }

    /// Set a register value (register order).
    pub fn set_register(&self, addr: u8, register: u8, value: u16) {
        self.state().registers.insert((addr, register), value);
    }

    /// Current value of a register (register order).
    pub fn register(&self, addr: u8, register: u8) -> Option<u16> {
        self.state().registers.get(&(addr, register)).copied()
    }

    /// Current value of a PHY register, zero if never set.
    pub fn phy_register(&self, register: u8) -> u16 {
        self.register(PHY_ADDR, register).unwrap_or(0)
    }

    /// All writes made so far (register order).
    pub fn writes(&self) -> Vec<(u8, u8, u16)> {
        self.state().writes.clone()
    }

    /// Values written to one PHY register, in order.
    pub fn writes_to(&self, register: u8) -> Vec<u16> {
        self.state()
            .writes
            .iter()
            .filter(|(addr, r, _)| *addr == PHY_ADDR && *r == register)
            .map(|(_, _, v)| *v)
            .collect()
    }

    /// Number of reads of one PHY register.
    pub fn read_count(&self, register: u8) -> usize {
        self.state()
            .reads
            .iter()
            .filter(|(addr, r)| *addr == PHY_ADDR && *r == register)
            .count()
    }

    /// Clear the access logs.
    pub fn clear_log(&self) {
        let mut state = self.state();
        state.writes.clear();
        state.reads.clear();
    }

    /// Keep `bits` set in a PHY register regardless of writes.
    pub fn set_stuck_bits(&self, register: u8, bits: u16) {
        let mut state = self.state();
        state.stuck.insert((PHY_ADDR, register), bits);
        let current = state.registers.get(&(PHY_ADDR, register)).copied().unwrap_or(0);
        state.registers.insert((PHY_ADDR, register), current | bits);
    }

    /// Make every access report "no device".
    pub fn set_absent(&self, absent: bool) {
        self.state().absent = absent;
    }

    /// Make every access fail with an I/O error.
    pub fn set_io_failure(&self, message: Option<&str>) {
        self.state().io_failure = message.map(str::to_string);
    }

    fn check_access(state: &MockState, addr: u8) -> Result<(), BusError> {
        if state.absent {
            return Err(BusError::NoDevice { addr });
        }
        if let Some(message) = &state.io_failure {
            return Err(BusError::Io(io::Error::other(message.clone())));
        }
        Ok(())
    }
}

impl RegisterBus for MockRegisterBus {
    fn read_word(&mut self, addr: u8, register: u8) -> Result<u16, BusError> {
        let mut state = self.state();
        Self::check_access(&state, addr)?;
        state.reads.push((addr, register));
        let value = state.registers.get(&(addr, register)).copied().unwrap_or(0);
        Ok(to_wire(value))
    }

    fn write_word(&mut self, addr: u8, register: u8, value: u16) -> Result<(), BusError> {
        let mut state = self.state();
        Self::check_access(&state, addr)?;

        let value = from_wire(value);
        state.writes.push((addr, register, value));

        let mut stored = value;
        // The reset bit self-clears once the PHY has taken the reset.
        if addr == PHY_ADDR && register == reg::CTRL {
            stored &= !ctrl::RESET;
        }
        stored |= state.stuck.get(&(addr, register)).copied().unwrap_or(0);
        state.registers.insert((addr, register), stored);
        Ok(())
    }
}
