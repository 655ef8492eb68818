//! Shared value types
//!
//! Everything here is plain data that may be copied out of the cache and handed
//! to collaborators without holding any lock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Index of a network interface (one neighbor table per interface)
pub type InterfaceId = usize;

/// 48-bit Ethernet link-layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LinkAddr(pub [u8; 6]);

impl LinkAddr {
    /// Placeholder stored while an address is still unknown
    pub const UNKNOWN: LinkAddr = LinkAddr([0; 6]);

    /// Create a link-layer address from its six octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The six octets of the address
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group (multicast or broadcast) bit of the first octet
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Copy an address out of a six-byte slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(octets))
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for LinkAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| crate::Error::Other(format!("Link address too short: {s}")))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| crate::Error::Other(format!("Invalid link address octet '{part}' in {s}")))?;
        }

        if parts.next().is_some() {
            return Err(crate::Error::Other(format!("Link address too long: {s}")));
        }

        Ok(Self(octets))
    }
}

/// Neighbor Unreachability Detection state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborState {
    /// Slot unused
    Free,
    /// Resolution in progress, link-layer address unknown
    Incomplete,
    /// Address known, reachability unconfirmed
    Stale,
    /// Stale entry in use, waiting before probing
    Delay,
    /// Unicast solicitations outstanding
    Probe,
    /// Reachability recently confirmed
    Reachable,
    /// Administratively configured, never aged
    Static,
}

impl NeighborState {
    /// Whether the entry holds a usable link-layer address
    pub fn is_resolved(&self) -> bool {
        !matches!(self, NeighborState::Free | NeighborState::Incomplete)
    }
}

impl fmt::Display for NeighborState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeighborState::Free => "free",
            NeighborState::Incomplete => "incomplete",
            NeighborState::Stale => "stale",
            NeighborState::Delay => "delay",
            NeighborState::Probe => "probe",
            NeighborState::Reachable => "reachable",
            NeighborState::Static => "static",
        };
        f.write_str(name)
    }
}

/// Flags carried by a Neighbor Advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertFlags {
    /// Sender is a router (R)
    pub router: bool,
    /// Reply to a solicitation (S)
    pub solicited: bool,
    /// Cached address should be replaced (O)
    pub override_flag: bool,
}

impl AdvertFlags {
    pub const ROUTER: u8 = 0x80;
    pub const SOLICITED: u8 = 0x40;
    pub const OVERRIDE: u8 = 0x20;

    /// Decode the flag byte at the start of an advertisement body
    pub fn from_bits(bits: u8) -> Self {
        Self {
            router: bits & Self::ROUTER != 0,
            solicited: bits & Self::SOLICITED != 0,
            override_flag: bits & Self::OVERRIDE != 0,
        }
    }

    /// Encode the flags into the advertisement flag byte
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.router {
            bits |= Self::ROUTER;
        }
        if self.solicited {
            bits |= Self::SOLICITED;
        }
        if self.override_flag {
            bits |= Self::OVERRIDE;
        }
        bits
    }
}

/// Diagnostic copy of one resolved cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSnapshot {
    /// Neighbor IPv6 address
    pub ip: Ipv6Addr,
    /// Cached link-layer address
    pub link_addr: LinkAddr,
    /// NUD state at the time of the snapshot
    pub state: NeighborState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_addr_display_and_parse() {
        let addr: LinkAddr = "02:00:5e:10:00:01".parse().unwrap();
        assert_eq!(addr, LinkAddr([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]));
        assert_eq!(addr.to_string(), "02:00:5e:10:00:01");

        assert!("02:00:5e".parse::<LinkAddr>().is_err());
        assert!("02:00:5e:10:00:01:ff".parse::<LinkAddr>().is_err());
        assert!("zz:00:5e:10:00:01".parse::<LinkAddr>().is_err());
    }

    #[test]
    fn link_addr_multicast_bit() {
        assert!(LinkAddr([0x33, 0x33, 0, 0, 0, 1]).is_multicast());
        assert!(!LinkAddr([0x02, 0, 0, 0, 0, 1]).is_multicast());
    }

    #[test]
    fn advert_flags_bits() {
        let flags = AdvertFlags::from_bits(0xe0);
        assert!(flags.router && flags.solicited && flags.override_flag);
        assert_eq!(flags.bits(), 0xe0);

        let flags = AdvertFlags::from_bits(0x40 | 0x1f);
        assert_eq!(
            flags,
            AdvertFlags {
                router: false,
                solicited: true,
                override_flag: false
            }
        );
    }

    #[test]
    fn resolved_states() {
        assert!(!NeighborState::Free.is_resolved());
        assert!(!NeighborState::Incomplete.is_resolved());
        assert!(NeighborState::Stale.is_resolved());
        assert!(NeighborState::Static.is_resolved());
    }
}
