//! Marvell Alaska 88E1111 driver.
//!
//! The 88E1111 is the copper PHY found in most 1000BASE-T SFPs. Out of
//! reset it usually runs 1000BASE-X towards the host; [`Phy::enable_sgmii`]
//! switches it to SGMII so the host side can follow 10/100/1000 copper
//! negotiation.

use tracing::{debug, info};

use crate::bus::RegisterBus;
use crate::caps::{CapabilitySet, Duplex, LinkStatus};
use crate::codec::{advertisement_bits, decode_link_partner_caps, decode_link_status};
use crate::driver::{clause22_soft_reset, modify_reg, read_reg, write_reg, Phy, PhyState, ResetPolicy};
use crate::error::{PhyError, Result};
use crate::regs::{adv, ctrl, ext_status, gige_ctrl, reg};

/// 88E1111 PHY identifier (OUI 0x005043, model 0x0c)
pub const PHY_ID: u32 = 0x0141_0cc0;
/// Identifier mask, ignores the revision nibble
pub const PHY_ID_MASK: u32 = 0xffff_fff0;

/// Driver for one 88E1111 instance.
#[derive(Debug, Clone)]
pub struct Marvell88E1111 {
    state: PhyState,
    reset: ResetPolicy,
}

impl Marvell88E1111 {
    /// Creates a driver with the default reset schedule.
    pub fn new() -> Self {
        Self::with_reset_policy(ResetPolicy::default())
    }

    /// Creates a driver with a specific reset schedule.
    pub fn with_reset_policy(reset: ResetPolicy) -> Self {
        Self {
            state: PhyState::Uninitialized,
            reset,
        }
    }

    /// Control register value for a forced speed, AN disabled.
    fn forced_ctrl(speed_mbps: u32, duplex: Duplex) -> Result<u16> {
        let speed_bits = match speed_mbps {
            1000 => ctrl::SPEED_1000,
            100 => ctrl::SPEED_100,
            10 => ctrl::SPEED_10,
            other => {
                return Err(PhyError::Config(format!("unsupported speed {other}")));
            }
        };

        let duplex_bits = match duplex {
            Duplex::Half => 0,
            Duplex::Full | Duplex::Unknown => ctrl::DUPLEX_FULL,
        };

        Ok(speed_bits | duplex_bits)
    }
}

impl Default for Marvell88E1111 {
    fn default() -> Self {
        Self::new()
    }
}

impl Phy for Marvell88E1111 {
    fn state(&self) -> PhyState {
        self.state
    }

    fn is_sgmii_capable(&self) -> bool {
        true
    }

    fn enable_sgmii<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        // HWCFG_MODE = SGMII without clock, SGMII auto-neg to copper;
        // fiber/copper auto selection off.
        let mask = ext_status::HWCFG_MODE_MASK | ext_status::AUTO_SELECT_DISABLE;
        let bits = ext_status::HWCFG_SGMII_NO_CLK_COPPER | ext_status::AUTO_SELECT_DISABLE;
        let value = modify_reg(bus, reg::EXT_PHY_STATUS, mask, bits)?;
        debug!(ext_status = format_args!("0x{value:04x}"), "88E1111 SGMII mode selected");

        self.soft_reset(bus)?;
        self.state = PhyState::SgmiiProbed;

        self.set_autoneg_caps(bus, &CapabilitySet::all())?;
        info!("88E1111 switched to SGMII");
        Ok(())
    }

    fn soft_reset<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        clause22_soft_reset(bus, &self.reset)
    }

    fn set_autoneg_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        caps: &CapabilitySet,
    ) -> Result<()> {
        let (an_adv, gige) = advertisement_bits(caps);
        modify_reg(bus, reg::AUTONEG_ADV, adv::OWNED, an_adv)?;
        modify_reg(bus, reg::GIGE_CTRL, gige_ctrl::OWNED, gige)?;

        let control = read_reg(bus, reg::CTRL)?;
        write_reg(bus, reg::CTRL, control | ctrl::AN_ENABLE)?;
        self.soft_reset(bus)?;

        self.state = PhyState::AutonegConfigured;
        debug!(
            an_adv = format_args!("0x{an_adv:04x}"),
            gige = format_args!("0x{gige:04x}"),
            "88E1111 auto-negotiation configured"
        );
        Ok(())
    }

    fn get_link_partner_caps<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<CapabilitySet> {
        let an_bits = read_reg(bus, reg::LP_ABILITY)?;
        let gige_bits = read_reg(bus, reg::GIGE_STATUS)?;
        Ok(decode_link_partner_caps(an_bits, gige_bits))
    }

    fn get_link_status<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<LinkStatus> {
        let status = decode_link_status(read_reg(bus, reg::PHY_STATUS)?)?;
        self.state = if status.is_up() {
            PhyState::LinkUp
        } else {
            PhyState::LinkDown
        };
        Ok(status)
    }

    fn set_speed_duplex<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        speed_mbps: u32,
        duplex: Duplex,
    ) -> Result<()> {
        let value = Self::forced_ctrl(speed_mbps, duplex)?;
        write_reg(bus, reg::CTRL, value)?;
        self.soft_reset(bus)?;

        self.state = PhyState::Forced;
        info!(speed_mbps, duplex = duplex.as_str(), "88E1111 speed/duplex forced");
        Ok(())
    }
}
