//! Register-level driver for copper PHYs that sit behind SFP transceivers.
//!
//! Copper SFPs carry a PHY reachable over the module's two-wire management
//! interface at a fixed administrative address. This crate speaks the
//! IEEE 802.3 clause 22 register protocol to that PHY:
//!
//! - [`bus`]: the [`RegisterBus`] contract the platform provides, and the
//!   wire byte-order conversion applied to every word
//! - [`codec`]: pure bit mapping between [`CapabilitySet`] / [`LinkStatus`]
//!   and register bit patterns
//! - [`driver`]: the [`PhyDriver`] state machine (SGMII enable, autoneg,
//!   forced speed/duplex, link status, bounded soft reset)
//! - [`directory`]: [`PhyDirectory`], PHY ID to driver lookup with mask
//!   matching
//!
//! # Example
//!
//! ```ignore
//! use sfp_phy::{PhyDirectory, Phy};
//!
//! let directory = PhyDirectory::standard();
//! let mut phy = directory.identify(&mut bus)?;
//! if phy.is_sgmii_capable() {
//!     phy.enable_sgmii(&mut bus)?;
//! }
//! let status = phy.get_link_status(&mut bus)?;
//! ```

pub mod bus;
pub mod caps;
pub mod codec;
pub mod directory;
pub mod driver;
pub mod error;
pub mod marvell;
pub mod regs;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bus::{from_wire, to_wire, RegisterBus};
pub use caps::{Capability, CapabilitySet, Duplex, LinkState, LinkStatus};
pub use codec::{advertisement_bits, decode_link_partner_caps, decode_link_status};
pub use directory::{assemble_phy_id, PhyDirectory, PhyEntry};
pub use driver::{Phy, PhyDriver, PhyKind, PhyState, ResetPolicy};
pub use error::{BusError, PhyError, Result};
pub use marvell::Marvell88E1111;
