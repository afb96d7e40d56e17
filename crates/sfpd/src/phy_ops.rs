//! PHY operations on a port.
//!
//! Every operation acquires the port's bus, identifies the PHY through the
//! directory, performs one driver call and releases the bus.

use std::thread;
use std::time::Duration;

use sfp_eeprom::PortType;
use sfp_phy::{CapabilitySet, Duplex, LinkStatus, Phy, PhyDirectory, PhyDriver, RegisterBus};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::Platform;

/// How hard to look for a PHY on module insertion.
///
/// PHYs need ~15 ms from power on before their registers respond; the
/// retry delay sits above scheduler granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub tries: u32,
    pub retry: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            tries: 1,
            retry: Duration::from_millis(75),
        }
    }
}

fn acquire_phy<P: Platform + ?Sized>(
    platform: &P,
    directory: &PhyDirectory,
    port_type: PortType,
    port_index: u32,
) -> Result<(PhyDriver, Box<dyn RegisterBus + Send>)> {
    let mut bus = platform.acquire_bus(port_type, port_index)?;
    let phy = directory.identify(&mut *bus)?;
    Ok((phy, bus))
}

/// Switches the port's PHY to SGMII if it has one that supports it.
///
/// Returns true when SGMII was enabled. Absence of a PHY, an unsupported
/// PHY and driver faults all give false after `policy.tries` attempts.
pub fn set_sgmii_enabled<P: Platform + ?Sized>(
    platform: &P,
    directory: &PhyDirectory,
    policy: &ProbePolicy,
    port_type: PortType,
    port_index: u32,
) -> bool {
    for attempt in 1..=policy.tries {
        let result = acquire_phy(platform, directory, port_type, port_index).and_then(
            |(mut phy, mut bus)| {
                if !phy.is_sgmii_capable() {
                    return Ok(false);
                }
                phy.enable_sgmii(&mut *bus)?;
                Ok(true)
            },
        );

        match result {
            Ok(enabled) => {
                if enabled {
                    info!(%port_type, port_index, "SGMII enabled");
                }
                return enabled;
            }
            Err(e) => {
                debug!(%port_type, port_index, attempt, error = %e, "PHY probe failed");
            }
        }

        if attempt < policy.tries {
            thread::sleep(policy.retry);
        }
    }
    false
}

/// Link status of the port's PHY; link down when no PHY answers.
pub fn phy_link_status<P: Platform + ?Sized>(
    platform: &P,
    directory: &PhyDirectory,
    port_type: PortType,
    port_index: u32,
) -> LinkStatus {
    let result = acquire_phy(platform, directory, port_type, port_index)
        .and_then(|(mut phy, mut bus)| Ok(phy.get_link_status(&mut *bus)?));

    match result {
        Ok(status) => status,
        Err(e) => {
            if e.is_phy_absent() {
                debug!(%port_type, port_index, error = %e, "no PHY link status");
            } else {
                warn!(%port_type, port_index, error = %e, "PHY link status read failed");
            }
            LinkStatus::down()
        }
    }
}

/// Forces the port's PHY to `speed_mbps` / `duplex` with autoneg off.
pub fn set_phy_speed_duplex<P: Platform + ?Sized>(
    platform: &P,
    directory: &PhyDirectory,
    port_type: PortType,
    port_index: u32,
    speed_mbps: u32,
    duplex: Duplex,
) -> Result<()> {
    let (mut phy, mut bus) = acquire_phy(platform, directory, port_type, port_index)?;
    phy.set_speed_duplex(&mut *bus, speed_mbps, duplex)?;
    Ok(())
}

/// Turns autoneg on in the port's PHY, advertising `caps`.
pub fn set_phy_autoneg<P: Platform + ?Sized>(
    platform: &P,
    directory: &PhyDirectory,
    port_type: PortType,
    port_index: u32,
    caps: &CapabilitySet,
) -> Result<()> {
    let (mut phy, mut bus) = acquire_phy(platform, directory, port_type, port_index)?;
    phy.set_autoneg_caps(&mut *bus, caps)?;
    Ok(())
}
