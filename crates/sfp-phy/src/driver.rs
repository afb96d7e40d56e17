//! PHY driver interface and state machine.
//!
//! Drivers form a closed set: [`PhyKind`] names each supported family and
//! [`PhyDriver`] is the tagged union the [`crate::PhyDirectory`] hands out.
//! Every driver implements [`Phy`].
//!
//! State moves only on explicit calls:
//!
//! ```text
//! Uninitialized -> SgmiiProbed -> AutonegConfigured -> LinkDown | LinkUp
//!                                \-> Forced (set_speed_duplex)
//! ```

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::bus::{from_wire, to_wire, RegisterBus};
use crate::caps::{CapabilitySet, Duplex, LinkStatus};
use crate::error::{PhyError, Result};
use crate::marvell::Marvell88E1111;
use crate::regs::{ctrl, reg, PHY_ADDR};

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyState {
    /// Identified, nothing configured yet
    Uninitialized,
    /// SGMII mode selected and committed
    SgmiiProbed,
    /// Auto-negotiation enabled with an advertisement
    AutonegConfigured,
    /// Auto-negotiation disabled, speed and duplex forced
    Forced,
    /// Last status read reported link down
    LinkDown,
    /// Last status read reported link up
    LinkUp,
}

/// Soft reset polling schedule.
///
/// The reset bit is polled every `poll_interval`, at most `max_polls`
/// times; the default budget is 7 x 75 ms = 525 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    /// Delay before each poll of the control register
    pub poll_interval: Duration,
    /// Number of polls before giving up
    pub max_polls: u32,
}

impl ResetPolicy {
    /// Default poll interval, the scheduler granularity plus margin.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(75);
    /// Default number of polls.
    pub const MAX_POLLS: u32 = 7;

    /// Polls without sleeping; for simulated buses.
    pub const fn immediate(max_polls: u32) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_polls,
        }
    }

    /// Total time budget of the schedule.
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_polls
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Self::POLL_INTERVAL,
            max_polls: Self::MAX_POLLS,
        }
    }
}

/// Operations every PHY driver provides.
pub trait Phy {
    /// Current state.
    fn state(&self) -> PhyState;

    /// Whether the PHY can run SGMII towards the host.
    ///
    /// If not, the host side is assumed to be 1000BASE-X over SERDES.
    fn is_sgmii_capable(&self) -> bool;

    /// Selects SGMII towards the host, commits with a soft reset and
    /// advertises every capability.
    fn enable_sgmii<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()>;

    /// Sets the reset bit and waits for it to self-clear.
    fn soft_reset<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()>;

    /// Enables auto-negotiation advertising `caps`.
    fn set_autoneg_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        caps: &CapabilitySet,
    ) -> Result<()>;

    /// Reads the capabilities the link partner advertises.
    fn get_link_partner_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<CapabilitySet>;

    /// Reads and decodes the link status.
    fn get_link_status<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<LinkStatus>;

    /// Disables auto-negotiation and forces speed and duplex.
    fn set_speed_duplex<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        speed_mbps: u32,
        duplex: Duplex,
    ) -> Result<()>;
}

/// Supported PHY families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyKind {
    /// Marvell Alaska 88E1111
    Marvell88E1111,
}

impl PhyKind {
    /// Builds a fresh driver of this kind.
    pub fn instantiate(self, reset: ResetPolicy) -> PhyDriver {
        match self {
            PhyKind::Marvell88E1111 => {
                PhyDriver::Marvell88E1111(Marvell88E1111::with_reset_policy(reset))
            }
        }
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            PhyKind::Marvell88E1111 => "Marvell 88E1111",
        }
    }
}

/// A driver instance for an identified PHY.
#[derive(Debug, Clone)]
pub enum PhyDriver {
    /// Marvell 88E1111
    Marvell88E1111(Marvell88E1111),
}

impl PhyDriver {
    /// The family of this driver.
    pub fn kind(&self) -> PhyKind {
        match self {
            PhyDriver::Marvell88E1111(_) => PhyKind::Marvell88E1111,
        }
    }
}

impl Phy for PhyDriver {
    fn state(&self) -> PhyState {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.state(),
        }
    }

    fn is_sgmii_capable(&self) -> bool {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.is_sgmii_capable(),
        }
    }

    fn enable_sgmii<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.enable_sgmii(bus),
        }
    }

    fn soft_reset<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.soft_reset(bus),
        }
    }

    fn set_autoneg_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        caps: &CapabilitySet,
    ) -> Result<()> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.set_autoneg_caps(bus, caps),
        }
    }

    fn get_link_partner_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<CapabilitySet> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.get_link_partner_caps(bus),
        }
    }

    fn get_link_status<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<LinkStatus> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.get_link_status(bus),
        }
    }

    fn set_speed_duplex<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        speed_mbps: u32,
        duplex: Duplex,
    ) -> Result<()> {
        match self {
            PhyDriver::Marvell88E1111(phy) => phy.set_speed_duplex(bus, speed_mbps, duplex),
        }
    }
}

/// Reads a register at [`PHY_ADDR`] and converts it to register order.
pub(crate) fn read_reg<B: RegisterBus + ?Sized>(bus: &mut B, register: u8) -> Result<u16> {
    Ok(from_wire(bus.read_word(PHY_ADDR, register)?))
}

/// Writes a register-order value to a register at [`PHY_ADDR`].
pub(crate) fn write_reg<B: RegisterBus + ?Sized>(bus: &mut B, register: u8, value: u16) -> Result<()> {
    bus.write_word(PHY_ADDR, register, to_wire(value))?;
    Ok(())
}

/// Replaces the bits under `mask` with `bits`, preserving everything else.
pub(crate) fn modify_reg<B: RegisterBus + ?Sized>(
    bus: &mut B,
    register: u8,
    mask: u16,
    bits: u16,
) -> Result<u16> {
    let current = read_reg(bus, register)?;
    let updated = (current & !mask) | (bits & mask);
    write_reg(bus, register, updated)?;
    Ok(updated)
}

/// Clause 22 soft reset with a bounded wait for the bit to self-clear.
pub(crate) fn clause22_soft_reset<B: RegisterBus + ?Sized>(
    bus: &mut B,
    policy: &ResetPolicy,
) -> Result<()> {
    let value = read_reg(bus, reg::CTRL)?;
    write_reg(bus, reg::CTRL, value | ctrl::RESET)?;

    for poll in 1..=policy.max_polls {
        thread::sleep(policy.poll_interval);
        if read_reg(bus, reg::CTRL)? & ctrl::RESET == 0 {
            debug!(polls = poll, "PHY soft reset complete");
            return Ok(());
        }
    }

    warn!(
        budget_ms = policy.budget().as_millis() as u64,
        "PHY soft reset did not complete"
    );
    Err(PhyError::access("reset timed out"))
}
