//! PHY identification.
//!
//! [`PhyDirectory`] is an ordered table of `(id, mask, kind)` entries. The
//! first entry whose pattern matches the PHY's masked identifier wins.

use tracing::debug;

use crate::bus::{from_wire, RegisterBus};
use crate::driver::{PhyDriver, PhyKind, ResetPolicy};
use crate::error::{PhyError, Result};
use crate::marvell;
use crate::regs::{reg, PHY_ADDR};

/// Assembles the 32-bit PHY identifier from the two ID words as read off
/// the bus.
///
/// The result is the high byte of register 2, its low byte, then the high
/// and low bytes of register 3. Words arrive in wire order, so this is not
/// a plain concatenation of the raw reads.
pub const fn assemble_phy_id(id1_raw: u16, id2_raw: u16) -> u32 {
    ((from_wire(id1_raw) as u32) << 16) | from_wire(id2_raw) as u32
}

/// One directory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyEntry {
    /// Identifier pattern, stored pre-masked
    pub id: u32,
    /// Mask applied to the read identifier before comparison
    pub mask: u32,
    /// Driver family to instantiate on a match
    pub kind: PhyKind,
}

impl PhyEntry {
    /// Creates an entry; `id` is masked on the way in.
    pub const fn new(id: u32, mask: u32, kind: PhyKind) -> Self {
        Self {
            id: id & mask,
            mask,
            kind,
        }
    }

    /// Returns true if `phy_id` belongs to this entry.
    pub const fn matches(&self, phy_id: u32) -> bool {
        phy_id & self.mask == self.id
    }
}

/// Lookup table from PHY identifier to driver.
#[derive(Debug, Clone)]
pub struct PhyDirectory {
    entries: Vec<PhyEntry>,
    reset: ResetPolicy,
}

impl PhyDirectory {
    /// Directory of every driver this crate ships.
    pub fn standard() -> Self {
        Self {
            entries: vec![PhyEntry::new(
                marvell::PHY_ID,
                marvell::PHY_ID_MASK,
                PhyKind::Marvell88E1111,
            )],
            reset: ResetPolicy::default(),
        }
    }

    /// Directory with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            reset: ResetPolicy::default(),
        }
    }

    /// Appends an entry; earlier entries take precedence.
    pub fn push(&mut self, entry: PhyEntry) {
        self.entries.push(entry);
    }

    /// Reset schedule given to drivers created by this directory.
    pub fn with_reset_policy(mut self, reset: ResetPolicy) -> Self {
        self.reset = reset;
        self
    }

    /// The entries in match order.
    pub fn entries(&self) -> &[PhyEntry] {
        &self.entries
    }

    /// First entry matching `phy_id`.
    pub fn lookup(&self, phy_id: u32) -> Option<&PhyEntry> {
        self.entries.iter().find(|entry| entry.matches(phy_id))
    }

    /// Reads the PHY identifier through `bus`.
    pub fn read_id<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<u32> {
        let id1 = bus.read_word(PHY_ADDR, reg::PHYID1)?;
        let id2 = bus.read_word(PHY_ADDR, reg::PHYID2)?;
        Ok(assemble_phy_id(id1, id2))
    }

    /// Identifies the PHY behind `bus` and returns a fresh driver for it.
    ///
    /// A bus that reports no device, or an identifier no entry matches,
    /// gives [`PhyError::NotFound`]; any other bus failure gives
    /// [`PhyError::Access`].
    pub fn identify<B: RegisterBus + ?Sized>(&self, bus: &mut B) -> Result<PhyDriver> {
        let phy_id = Self::read_id(bus)?;

        let entry = self
            .lookup(phy_id)
            .ok_or_else(|| PhyError::not_found(format!("unsupported phy with id 0x{phy_id:08x}")))?;

        debug!(
            phy_id = format_args!("0x{phy_id:08x}"),
            kind = entry.kind.name(),
            "PHY identified"
        );
        Ok(entry.kind.instantiate(self.reset))
    }
}

impl Default for PhyDirectory {
    fn default() -> Self {
        Self::standard()
    }
}
