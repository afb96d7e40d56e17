//! Capability and link status types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PhyError;

/// One advertisable speed/duplex combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// 1000 Mb/s full duplex
    Full1000,
    /// 1000 Mb/s half duplex
    Half1000,
    /// 100 Mb/s full duplex
    Full100,
    /// 100 Mb/s half duplex
    Half100,
    /// 10 Mb/s full duplex
    Full10,
    /// 10 Mb/s half duplex
    Half10,
}

impl Capability {
    /// All capabilities, in the order they are conventionally listed.
    pub const ALL: [Capability; 6] = [
        Capability::Full1000,
        Capability::Half1000,
        Capability::Full100,
        Capability::Half100,
        Capability::Full10,
        Capability::Half10,
    ];

    /// The key used for this capability on the command channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Full1000 => "1000full",
            Capability::Half1000 => "1000half",
            Capability::Full100 => "100full",
            Capability::Half100 => "100half",
            Capability::Full10 => "10full",
            Capability::Half10 => "10half",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = PhyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| PhyError::Config(format!("unknown capability '{s}'")))
    }
}

/// Capability name to "advertise this" flag.
///
/// A missing key is equivalent to `false`; when decoding a link partner's
/// abilities only set bits produce keys, so absence never means
/// "unsupported" on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeMap<Capability, bool>);

impl CapabilitySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability enabled.
    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Sets the flag for a capability.
    pub fn set(&mut self, cap: Capability, enabled: bool) {
        self.0.insert(cap, enabled);
    }

    /// Returns the flag for a capability, `false` when absent.
    pub fn get(&self, cap: Capability) -> bool {
        self.0.get(&cap).copied().unwrap_or(false)
    }

    /// Returns true if the capability has an explicit entry.
    pub fn contains_key(&self, cap: Capability) -> bool {
        self.0.contains_key(&cap)
    }

    /// Iterates over the capabilities whose flag is `true`.
    pub fn enabled(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().filter(|(_, on)| **on).map(|(cap, _)| *cap)
    }

    /// Iterates over all explicit entries.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.0.iter().map(|(cap, on)| (*cap, *on))
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().map(|cap| (cap, true)).collect())
    }
}

impl FromIterator<(Capability, bool)> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = (Capability, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link is up
    Up,
    /// Link is down
    Down,
}

impl LinkState {
    /// Convert to the string used in replies.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "up",
            LinkState::Down => "down",
        }
    }
}

/// Duplex mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    /// Full duplex
    Full,
    /// Half duplex
    Half,
    /// Not resolved (autoneg in progress, or link down)
    Unknown,
}

impl Duplex {
    /// Convert to the string used in replies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Duplex::Full => "full",
            Duplex::Half => "half",
            Duplex::Unknown => "unknown",
        }
    }

    /// Parses a duplex request; only "half" selects half duplex.
    pub fn from_request(s: &str) -> Self {
        if s.eq_ignore_ascii_case("half") {
            Duplex::Half
        } else {
            Duplex::Full
        }
    }
}

/// Decoded link status.
///
/// `speed_mbps` and `duplex` carry information only when the link is up
/// and the PHY has resolved speed and duplex; otherwise they are `0` and
/// [`Duplex::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Link state
    pub state: LinkState,
    /// Speed in Mb/s: 0, 10, 100 or 1000
    pub speed_mbps: u32,
    /// Duplex mode
    pub duplex: Duplex,
}

impl LinkStatus {
    /// Link down, nothing resolved.
    pub const fn down() -> Self {
        Self {
            state: LinkState::Down,
            speed_mbps: 0,
            duplex: Duplex::Unknown,
        }
    }

    /// Link up at the given speed and duplex.
    pub const fn up(speed_mbps: u32, duplex: Duplex) -> Self {
        Self {
            state: LinkState::Up,
            speed_mbps,
            duplex,
        }
    }

    /// Link up, speed and duplex still unresolved.
    pub const fn up_unresolved() -> Self {
        Self {
            state: LinkState::Up,
            speed_mbps: 0,
            duplex: Duplex::Unknown,
        }
    }

    /// Returns true if the link is up.
    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("2500full".parse::<Capability>().is_err());
    }

    #[test]
    fn test_missing_key_reads_false() {
        let mut caps = CapabilitySet::new();
        caps.set(Capability::Full100, true);
        assert!(caps.get(Capability::Full100));
        assert!(!caps.get(Capability::Half10));
        assert!(!caps.contains_key(Capability::Half10));
    }

    #[test]
    fn test_all_enables_six() {
        let caps = CapabilitySet::all();
        assert_eq!(caps.len(), 6);
        assert_eq!(caps.enabled().count(), 6);
    }

    #[test]
    fn test_enabled_skips_false_entries() {
        let caps: CapabilitySet = [(Capability::Full10, true), (Capability::Half10, false)]
            .into_iter()
            .collect();
        assert_eq!(caps.enabled().collect::<Vec<_>>(), vec![Capability::Full10]);
    }

    #[test]
    fn test_duplex_from_request() {
        assert_eq!(Duplex::from_request("half"), Duplex::Half);
        assert_eq!(Duplex::from_request("HALF"), Duplex::Half);
        assert_eq!(Duplex::from_request("full"), Duplex::Full);
        assert_eq!(Duplex::from_request("auto"), Duplex::Full);
    }

    #[test]
    fn test_link_status_default_is_down() {
        let status = LinkStatus::default();
        assert!(!status.is_up());
        assert_eq!(status.speed_mbps, 0);
        assert_eq!(status.duplex, Duplex::Unknown);
    }
}
