//! NDP message body and option parsing
//!
//! Only the parts of Neighbor Solicitation and Neighbor Advertisement bodies
//! that drive the neighbor cache are interpreted here. Checksums and the
//! ICMPv6 header are the caller's business; every function takes the bytes
//! that follow the 4-byte ICMPv6 header.
//!
//! ## Body layout
//!
//! ```text
//! 0        1                 4                               20
//! +--------+-----------------+-------------------------------+------------
//! | flags  |    reserved     |        target address         | options...
//! +--------+-----------------+-------------------------------+------------
//! ```
//!
//! Options are `{type: u8, length: u8, value}` records whose length counts
//! 8-byte units including the two header bytes.

use std::net::Ipv6Addr;
use thiserror::Error;

use crate::types::{AdvertFlags, LinkAddr};

/// Fixed part of a solicitation or advertisement body
pub const BODY_MIN_LEN: usize = 20;

/// Offset of the option block inside the body
pub const OPTIONS_OFFSET: usize = 20;

/// Source Link-Layer Address option type
pub const OPT_SOURCE_LINK_ADDR: u8 = 1;

/// Target Link-Layer Address option type
pub const OPT_TARGET_LINK_ADDR: u8 = 2;

/// Option lengths are expressed in units of this many bytes
const OPTION_UNIT: usize = 8;

/// All-nodes link-local multicast address (ff02::1)
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Reasons an inbound message is discarded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("body is {len} bytes, need at least 20")]
    TooShort { len: usize },

    #[error("zero-length option at offset {offset}")]
    ZeroLengthOption { offset: usize },

    #[error("option at offset {offset} declares {declared} bytes, {remaining} remain")]
    OptionOverrun {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    #[error("link-layer address option at offset {offset} is {len} bytes, expected 8")]
    BadLinkLayerOption { offset: usize, len: usize },

    #[error("link-layer address option carries multicast address {0}")]
    MulticastLinkAddr(LinkAddr),

    #[error("target address {0} is multicast")]
    MulticastTarget(Ipv6Addr),

    #[error("unspecified source with a source link-layer address option")]
    UnspecifiedSourceWithLinkAddr,

    #[error("unspecified source but destination {0} is not solicited-node multicast")]
    NotSolicitedNodeDestination(Ipv6Addr),

    #[error("solicited advertisement sent to multicast destination {0}")]
    SolicitedFlagOnMulticast(Ipv6Addr),
}

/// One decoded NDP option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdpOption<'a> {
    SourceLinkAddr(LinkAddr),
    TargetLinkAddr(LinkAddr),
    Unknown { kind: u8, data: &'a [u8] },
}

/// Length-prefixed iterator over an option block
///
/// Yields `Err` once on the first malformed option and then stops, so a
/// caller that collects into `Result` discards the whole block.
#[derive(Debug, Clone)]
pub struct Options<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Options<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            done: false,
        }
    }

    fn decode(&mut self) -> Result<NdpOption<'a>, WireError> {
        let offset = self.offset;
        let remaining = self.buf.len() - offset;

        if remaining < 2 {
            return Err(WireError::OptionOverrun {
                offset,
                declared: OPTION_UNIT,
                remaining,
            });
        }

        let kind = self.buf[offset];
        let units = self.buf[offset + 1] as usize;
        if units == 0 {
            return Err(WireError::ZeroLengthOption { offset });
        }

        let declared = units * OPTION_UNIT;
        if declared > remaining {
            return Err(WireError::OptionOverrun {
                offset,
                declared,
                remaining,
            });
        }

        let record = &self.buf[offset..offset + declared];
        self.offset += declared;

        match kind {
            OPT_SOURCE_LINK_ADDR | OPT_TARGET_LINK_ADDR => {
                if declared != OPTION_UNIT {
                    return Err(WireError::BadLinkLayerOption {
                        offset,
                        len: declared,
                    });
                }
                let addr = LinkAddr::from_slice(&record[2..8]).ok_or(WireError::BadLinkLayerOption {
                    offset,
                    len: declared,
                })?;
                if addr.is_multicast() {
                    return Err(WireError::MulticastLinkAddr(addr));
                }
                Ok(if kind == OPT_SOURCE_LINK_ADDR {
                    NdpOption::SourceLinkAddr(addr)
                } else {
                    NdpOption::TargetLinkAddr(addr)
                })
            }
            _ => Ok(NdpOption::Unknown {
                kind,
                data: &record[2..],
            }),
        }
    }
}

impl<'a> Iterator for Options<'a> {
    type Item = Result<NdpOption<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        let item = self.decode();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Decoded Neighbor Solicitation body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSolicitation {
    pub target: Ipv6Addr,
    pub source_link_addr: Option<LinkAddr>,
}

impl NeighborSolicitation {
    pub fn parse(body: &[u8]) -> Result<Self, WireError> {
        let target = parse_target(body)?;
        let mut source_link_addr = None;

        for option in Options::new(&body[OPTIONS_OFFSET..]) {
            if let NdpOption::SourceLinkAddr(addr) = option? {
                source_link_addr = Some(addr);
            }
        }

        Ok(Self {
            target,
            source_link_addr,
        })
    }
}

/// Decoded Neighbor Advertisement body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborAdvertisement {
    pub flags: AdvertFlags,
    pub target: Ipv6Addr,
    pub target_link_addr: Option<LinkAddr>,
}

impl NeighborAdvertisement {
    pub fn parse(body: &[u8]) -> Result<Self, WireError> {
        let target = parse_target(body)?;
        let flags = AdvertFlags::from_bits(body[0]);
        let mut target_link_addr = None;

        for option in Options::new(&body[OPTIONS_OFFSET..]) {
            if let NdpOption::TargetLinkAddr(addr) = option? {
                target_link_addr = Some(addr);
            }
        }

        Ok(Self {
            flags,
            target,
            target_link_addr,
        })
    }
}

fn parse_target(body: &[u8]) -> Result<Ipv6Addr, WireError> {
    if body.len() < BODY_MIN_LEN {
        return Err(WireError::TooShort { len: body.len() });
    }

    let mut octets = [0u8; 16];
    octets.copy_from_slice(&body[4..20]);
    let target = Ipv6Addr::from(octets);

    if target.is_multicast() {
        return Err(WireError::MulticastTarget(target));
    }
    Ok(target)
}

/// Solicited-node multicast address for `addr` (ff02::1:ffXX:XXXX)
pub fn solicited_node_multicast(addr: &Ipv6Addr) -> Ipv6Addr {
    let o = addr.octets();
    Ipv6Addr::from([
        0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff, o[13], o[14], o[15],
    ])
}

/// Whether `addr` lies in ff02::1:ff00:0/104
pub fn is_solicited_node_multicast(addr: &Ipv6Addr) -> bool {
    addr.octets()[..13] == [0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Ipv6Addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0x1234, 0x5678);
    const MAC: [u8; 6] = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn body(flags: u8, target: Ipv6Addr, options: &[u8]) -> Vec<u8> {
        let mut buf = vec![flags, 0, 0, 0];
        buf.extend_from_slice(&target.octets());
        buf.extend_from_slice(options);
        buf
    }

    fn lla(kind: u8, mac: [u8; 6]) -> Vec<u8> {
        let mut opt = vec![kind, 1];
        opt.extend_from_slice(&mac);
        opt
    }

    #[test]
    fn solicitation_with_source_option() {
        let msg = NeighborSolicitation::parse(&body(0, TARGET, &lla(OPT_SOURCE_LINK_ADDR, MAC))).unwrap();
        assert_eq!(msg.target, TARGET);
        assert_eq!(msg.source_link_addr, Some(LinkAddr(MAC)));
    }

    #[test]
    fn advertisement_flags_and_target_option() {
        let msg =
            NeighborAdvertisement::parse(&body(0x60, TARGET, &lla(OPT_TARGET_LINK_ADDR, MAC))).unwrap();
        assert!(msg.flags.solicited);
        assert!(msg.flags.override_flag);
        assert!(!msg.flags.router);
        assert_eq!(msg.target_link_addr, Some(LinkAddr(MAC)));
    }

    #[test]
    fn unknown_options_are_skipped() {
        let mut options = vec![14, 2];
        options.extend_from_slice(&[0u8; 14]);
        options.extend(lla(OPT_SOURCE_LINK_ADDR, MAC));

        let msg = NeighborSolicitation::parse(&body(0, TARGET, &options)).unwrap();
        assert_eq!(msg.source_link_addr, Some(LinkAddr(MAC)));
    }

    #[test]
    fn short_body_is_rejected() {
        assert_eq!(
            NeighborSolicitation::parse(&[0u8; 19]),
            Err(WireError::TooShort { len: 19 })
        );
    }

    #[test]
    fn zero_length_option_invalidates_block() {
        let mut options = lla(OPT_SOURCE_LINK_ADDR, MAC);
        options.extend_from_slice(&[7, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(
            NeighborSolicitation::parse(&body(0, TARGET, &options)),
            Err(WireError::ZeroLengthOption { offset: 8 })
        );
    }

    #[test]
    fn overrunning_option_invalidates_block() {
        let options = [OPT_TARGET_LINK_ADDR, 2, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            NeighborAdvertisement::parse(&body(0, TARGET, &options)),
            Err(WireError::OptionOverrun { declared: 16, remaining: 8, .. })
        ));
    }

    #[test]
    fn link_layer_option_must_be_one_unit_and_unicast() {
        let mut long = vec![OPT_SOURCE_LINK_ADDR, 2];
        long.extend_from_slice(&[0u8; 14]);
        assert!(matches!(
            NeighborSolicitation::parse(&body(0, TARGET, &long)),
            Err(WireError::BadLinkLayerOption { len: 16, .. })
        ));

        let multicast = lla(OPT_SOURCE_LINK_ADDR, [0x33, 0x33, 0, 0, 0, 1]);
        assert!(matches!(
            NeighborSolicitation::parse(&body(0, TARGET, &multicast)),
            Err(WireError::MulticastLinkAddr(_))
        ));
    }

    #[test]
    fn multicast_target_is_rejected() {
        let target = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
        assert_eq!(
            NeighborAdvertisement::parse(&body(0, target, &[])),
            Err(WireError::MulticastTarget(target))
        );
    }

    #[test]
    fn iterator_stops_after_error() {
        let buf = [7u8, 0, 1, 1, 0, 0, 0, 0];
        let mut options = Options::new(&buf);
        assert!(matches!(options.next(), Some(Err(_))));
        assert!(options.next().is_none());
    }

    #[test]
    fn solicited_node_derivation() {
        let group = solicited_node_multicast(&TARGET);
        assert_eq!(group, "ff02::1:ff34:5678".parse::<Ipv6Addr>().unwrap());
        assert!(is_solicited_node_multicast(&group));
        assert!(!is_solicited_node_multicast(&ALL_NODES));
    }
}
