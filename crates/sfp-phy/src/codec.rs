//! Bit mapping between capability sets / link status and PHY registers.
//!
//! Pure functions, no I/O. All values are in register order.

use crate::caps::{Capability, CapabilitySet, Duplex, LinkStatus};
use crate::error::{PhyError, Result};
use crate::regs::{adv, gige_ctrl, gige_status, phy_status};

/// Register bit advertising `cap`: `(in_advertisement, bit)`.
fn advertisement_bit(cap: Capability) -> (bool, u16) {
    match cap {
        Capability::Full1000 => (false, gige_ctrl::ADV_1000_FD),
        Capability::Half1000 => (false, gige_ctrl::ADV_1000_HD),
        Capability::Full100 => (true, adv::TX_FD),
        Capability::Half100 => (true, adv::TX_HD),
        Capability::Full10 => (true, adv::T10_FD),
        Capability::Half10 => (true, adv::T10_HD),
    }
}

/// Computes `(advertisement, 1000BASE-T control)` field bits for `caps`.
///
/// The advertisement always carries the 802.3 selector, pause and
/// asymmetric pause. 10/100 capabilities land in the advertisement
/// register, 1000 capabilities in the 1000BASE-T control register. Only
/// bits inside [`adv::OWNED`] / [`gige_ctrl::OWNED`] are ever produced.
pub fn advertisement_bits(caps: &CapabilitySet) -> (u16, u16) {
    let mut an_adv = adv::BASE;
    let mut gige = 0u16;

    for cap in caps.enabled() {
        match advertisement_bit(cap) {
            (true, bit) => an_adv |= bit,
            (false, bit) => gige |= bit,
        }
    }

    (an_adv, gige)
}

/// Decodes the link partner ability and 1000BASE-T status registers.
///
/// A capability key is inserted (as `true`) only when its bit is set.
pub fn decode_link_partner_caps(an_bits: u16, gige_status_bits: u16) -> CapabilitySet {
    let checks = [
        (an_bits, adv::TX_FD, Capability::Full100),
        (an_bits, adv::TX_HD, Capability::Half100),
        (an_bits, adv::T10_FD, Capability::Full10),
        (an_bits, adv::T10_HD, Capability::Half10),
        (gige_status_bits, gige_status::LP_1000_FD, Capability::Full1000),
        (gige_status_bits, gige_status::LP_1000_HD, Capability::Half1000),
    ];

    checks
        .into_iter()
        .filter(|(bits, mask, _)| bits & mask != 0)
        .map(|(_, _, cap)| cap)
        .collect()
}

/// Decodes the PHY specific status register.
///
/// Speed and duplex are reported only when the link is up and the
/// resolved bit is set. A resolved speed field of `0b11` is reserved and
/// reported as a decode error.
pub fn decode_link_status(status_bits: u16) -> Result<LinkStatus> {
    if status_bits & phy_status::LINK_UP == 0 {
        return Ok(LinkStatus::down());
    }
    if status_bits & phy_status::RESOLVED == 0 {
        return Ok(LinkStatus::up_unresolved());
    }

    let duplex = if status_bits & phy_status::DUPLEX_FULL != 0 {
        Duplex::Full
    } else {
        Duplex::Half
    };

    let speed = match status_bits & phy_status::SPEED_MASK {
        phy_status::SPEED_10 => 10,
        phy_status::SPEED_100 => 100,
        phy_status::SPEED_1000 => 1000,
        other => {
            return Err(PhyError::Decode(format!(
                "reserved speed field 0b{:02b} in status 0x{status_bits:04x}",
                other >> 14
            )))
        }
    };

    Ok(LinkStatus::up(speed, duplex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::LinkState;
    use pretty_assertions::assert_eq;

    /// What a partner advertising the same 1000BASE-T bits reports in
    /// register 10: the control bits shifted up by two.
    fn gige_ctrl_as_partner_status(ctrl: u16) -> u16 {
        (ctrl & gige_ctrl::OWNED) << 2
    }

    fn subset(mask: u8) -> CapabilitySet {
        Capability::ALL
            .into_iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, cap)| cap)
            .collect()
    }

    #[test]
    fn test_base_bits_always_present() {
        let (an_adv, gige) = advertisement_bits(&CapabilitySet::new());
        assert_eq!(an_adv, adv::SELECTOR_802_3 | adv::PAUSE | adv::ASYM_PAUSE);
        assert_eq!(gige, 0);
    }

    #[test]
    fn test_all_capabilities_bits() {
        let (an_adv, gige) = advertisement_bits(&CapabilitySet::all());
        assert_eq!(an_adv, 0x0de1);
        assert_eq!(gige, 0x0300);
    }

    #[test]
    fn test_false_entries_not_advertised() {
        let mut caps = CapabilitySet::new();
        caps.set(Capability::Full100, false);
        caps.set(Capability::Full1000, true);
        let (an_adv, gige) = advertisement_bits(&caps);
        assert_eq!(an_adv & adv::TX_FD, 0);
        assert_eq!(gige, gige_ctrl::ADV_1000_FD);
    }

    #[test]
    fn test_bits_stay_inside_owned_fields() {
        for mask in 0..64u8 {
            let (an_adv, gige) = advertisement_bits(&subset(mask));
            assert_eq!(an_adv & !adv::OWNED, 0);
            assert_eq!(gige & !gige_ctrl::OWNED, 0);
        }
    }

    #[test]
    fn test_every_subset_decodes_back_exactly() {
        for mask in 0..64u8 {
            let caps = subset(mask);
            let (an_adv, gige) = advertisement_bits(&caps);
            let decoded = decode_link_partner_caps(an_adv, gige_ctrl_as_partner_status(gige));
            assert_eq!(decoded, caps, "subset mask {mask:06b}");
        }
    }

    #[test]
    fn test_partner_decode_ignores_pause_and_selector() {
        let decoded = decode_link_partner_caps(adv::BASE, 0);
        assert!(decoded.is_empty());
    }

    /// Expected decode for link/resolved/duplex/speed, written out as a table.
    fn expected(link: bool, resolved: bool, full: bool, speed: u16) -> Option<LinkStatus> {
        match (link, resolved, full, speed) {
            (false, _, _, _) => Some(LinkStatus::down()),
            (true, false, _, _) => Some(LinkStatus::up_unresolved()),
            (true, true, true, 0b00) => Some(LinkStatus::up(10, Duplex::Full)),
            (true, true, false, 0b00) => Some(LinkStatus::up(10, Duplex::Half)),
            (true, true, true, 0b01) => Some(LinkStatus::up(100, Duplex::Full)),
            (true, true, false, 0b01) => Some(LinkStatus::up(100, Duplex::Half)),
            (true, true, true, 0b10) => Some(LinkStatus::up(1000, Duplex::Full)),
            (true, true, false, 0b10) => Some(LinkStatus::up(1000, Duplex::Half)),
            (true, true, _, _) => None,
        }
    }

    #[test]
    fn test_link_status_table() {
        for combo in 0..32u16 {
            let link = combo & 0b00001 != 0;
            let resolved = combo & 0b00010 != 0;
            let full = combo & 0b00100 != 0;
            let speed = combo >> 3;

            let mut bits = 0u16;
            if link {
                bits |= phy_status::LINK_UP;
            }
            if resolved {
                bits |= phy_status::RESOLVED;
            }
            if full {
                bits |= phy_status::DUPLEX_FULL;
            }
            bits |= speed << 14;

            match (expected(link, resolved, full, speed), decode_link_status(bits)) {
                (Some(want), Ok(got)) => assert_eq!(got, want, "status 0x{bits:04x}"),
                (None, Err(PhyError::Decode(_))) => {}
                (want, got) => panic!("status 0x{bits:04x}: want {want:?}, got {got:?}"),
            }
        }
    }

    #[test]
    fn test_unrelated_bits_do_not_change_decode() {
        let bits = phy_status::LINK_UP | phy_status::RESOLVED | phy_status::SPEED_1000 | 0x03ff;
        let status = decode_link_status(bits).unwrap();
        assert_eq!(status.state, LinkState::Up);
        assert_eq!(status.speed_mbps, 1000);
        assert_eq!(status.duplex, Duplex::Half);
    }
}
