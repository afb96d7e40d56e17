//! PHY register map.
//!
//! Addresses and bit positions are in register order (see [`crate::bus`]).
//! Registers 0-15 are IEEE 802.3 clause 22; 16 and up are Marvell 88E1111
//! vendor registers.

/// Administrative bus address of a PHY inside an SFP (0xAC >> 1).
///
/// Finisar application note AN-2036, and the convention every copper SFP
/// vendor follows.
pub const PHY_ADDR: u8 = 0x56;

/// Register addresses
pub mod reg {
    /// Control register
    pub const CTRL: u8 = 0x00;
    /// PHY identifier, most significant word (IEEE 802.3 table 22-6)
    pub const PHYID1: u8 = 0x02;
    /// PHY identifier, least significant word
    pub const PHYID2: u8 = 0x03;
    /// Auto-negotiation advertisement
    pub const AUTONEG_ADV: u8 = 0x04;
    /// Link partner ability
    pub const LP_ABILITY: u8 = 0x05;
    /// 1000BASE-T control
    pub const GIGE_CTRL: u8 = 0x09;
    /// 1000BASE-T status
    pub const GIGE_STATUS: u8 = 0x0a;
    /// PHY specific status (copper)
    pub const PHY_STATUS: u8 = 0x11;
    /// Extended PHY specific status
    pub const EXT_PHY_STATUS: u8 = 0x1b;
}

/// Control register (0) bits
pub mod ctrl {
    /// Software reset, self-clearing
    pub const RESET: u16 = 1 << 15;
    /// Speed select, least significant bit
    pub const SPEED_LSB: u16 = 1 << 13;
    /// Auto-negotiation enable
    pub const AN_ENABLE: u16 = 1 << 12;
    /// Full duplex
    pub const DUPLEX_FULL: u16 = 1 << 8;
    /// Speed select, most significant bit
    pub const SPEED_MSB: u16 = 1 << 6;

    /// Speed bits for 1000 Mb/s
    pub const SPEED_1000: u16 = SPEED_MSB;
    /// Speed bits for 100 Mb/s
    pub const SPEED_100: u16 = SPEED_LSB;
    /// Speed bits for 10 Mb/s
    pub const SPEED_10: u16 = 0;
}

/// Advertisement (4) and link partner ability (5) bits
pub mod adv {
    /// Selector field value for IEEE 802.3
    pub const SELECTOR_802_3: u16 = 0x0001;
    /// Selector field mask
    pub const SELECTOR_MASK: u16 = 0x001f;
    /// 10BASE-T half duplex
    pub const T10_HD: u16 = 1 << 5;
    /// 10BASE-T full duplex
    pub const T10_FD: u16 = 1 << 6;
    /// 100BASE-TX half duplex
    pub const TX_HD: u16 = 1 << 7;
    /// 100BASE-TX full duplex
    pub const TX_FD: u16 = 1 << 8;
    /// Symmetric pause
    pub const PAUSE: u16 = 1 << 10;
    /// Asymmetric pause
    pub const ASYM_PAUSE: u16 = 1 << 11;

    /// Bits always advertised.
    pub const BASE: u16 = SELECTOR_802_3 | PAUSE | ASYM_PAUSE;

    /// Every bit the advertisement field owns in register 4.
    pub const OWNED: u16 = SELECTOR_MASK | T10_HD | T10_FD | TX_HD | TX_FD | PAUSE | ASYM_PAUSE;
}

/// 1000BASE-T control register (9) bits
pub mod gige_ctrl {
    /// Advertise 1000BASE-T half duplex
    pub const ADV_1000_HD: u16 = 1 << 8;
    /// Advertise 1000BASE-T full duplex
    pub const ADV_1000_FD: u16 = 1 << 9;

    /// Every bit the advertisement field owns in register 9.
    pub const OWNED: u16 = ADV_1000_HD | ADV_1000_FD;
}

/// 1000BASE-T status register (10) bits
pub mod gige_status {
    /// Link partner advertises 1000BASE-T half duplex
    pub const LP_1000_HD: u16 = 1 << 10;
    /// Link partner advertises 1000BASE-T full duplex
    pub const LP_1000_FD: u16 = 1 << 11;
}

/// PHY specific status register (17) bits
pub mod phy_status {
    /// Real time link up
    pub const LINK_UP: u16 = 1 << 10;
    /// Speed and duplex resolved
    pub const RESOLVED: u16 = 1 << 11;
    /// Full duplex (valid when resolved)
    pub const DUPLEX_FULL: u16 = 1 << 13;
    /// Speed field mask, bits 15:14 (valid when resolved)
    pub const SPEED_MASK: u16 = 0b11 << 14;
    /// Speed field value for 10 Mb/s
    pub const SPEED_10: u16 = 0b00 << 14;
    /// Speed field value for 100 Mb/s
    pub const SPEED_100: u16 = 0b01 << 14;
    /// Speed field value for 1000 Mb/s
    pub const SPEED_1000: u16 = 0b10 << 14;
}

/// Extended PHY specific status register (27) bits
pub mod ext_status {
    /// Fiber/copper auto selection disable
    pub const AUTO_SELECT_DISABLE: u16 = 1 << 15;
    /// HWCFG_MODE field mask, bits 3:0
    pub const HWCFG_MODE_MASK: u16 = 0x000f;
    /// HWCFG_MODE: SGMII without clock, SGMII auto-negotiation to copper
    pub const HWCFG_SGMII_NO_CLK_COPPER: u16 = 0x0004;
}
