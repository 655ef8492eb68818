// # NDP Link Trait
//
// The IPv6 layer below the neighbor cache. It builds the ICMPv6 packets,
// computes checksums and hands frames to the link layer; the cache only says
// what to send and to whom.
//
// ## Usage
//
// ```rust,ignore
// use ndp_core::{NdpLink, SolicitationRequest};
//
// link.send_solicitation(0, SolicitationRequest::multicast(target)).await?;
// ```

use async_trait::async_trait;
use std::net::Ipv6Addr;

use crate::types::{InterfaceId, LinkAddr};
use crate::wire::solicited_node_multicast;

/// Neighbor Solicitation the cache wants transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolicitationRequest {
    /// IPv6 destination (solicited-node group or the neighbor itself)
    pub destination: Ipv6Addr,
    /// Address being resolved or probed
    pub target: Ipv6Addr,
    /// Link-layer destination for unicast probes; `None` means multicast
    pub link_addr: Option<LinkAddr>,
}

impl SolicitationRequest {
    /// Address resolution: sent to the target's solicited-node group
    pub fn multicast(target: Ipv6Addr) -> Self {
        Self {
            destination: solicited_node_multicast(&target),
            target,
            link_addr: None,
        }
    }

    /// Reachability probe: sent straight to the cached link-layer address
    pub fn unicast(target: Ipv6Addr, link_addr: LinkAddr) -> Self {
        Self {
            destination: target,
            target,
            link_addr: Some(link_addr),
        }
    }

    pub fn is_multicast(&self) -> bool {
        self.link_addr.is_none()
    }
}

/// Neighbor Advertisement sent in reply to a solicitation for a local address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementReply {
    /// Soliciting node, or all-nodes for a DAD probe
    pub destination: Ipv6Addr,
    /// Our own address that was solicited
    pub target: Ipv6Addr,
    /// S flag
    pub solicited: bool,
    /// O flag
    pub override_flag: bool,
    /// Whether to append a Target Link-Layer Address option
    pub include_target_link_addr: bool,
}

/// Trait for the transmit side of Neighbor Discovery
///
/// Implementations must be thread-safe. They are always called with the
/// cache's exclusive region released, so they may block or await freely.
#[async_trait]
pub trait NdpLink: Send + Sync {
    /// Transmit a Neighbor Solicitation on `ifc`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Handed to the link layer
    /// - `Err(Error)`: Not sent; the cache retries on the next timer expiry
    async fn send_solicitation(
        &self,
        ifc: InterfaceId,
        request: SolicitationRequest,
    ) -> Result<(), crate::Error>;

    /// Transmit a Neighbor Advertisement on `ifc`
    async fn send_advertisement(
        &self,
        ifc: InterfaceId,
        reply: AdvertisementReply,
    ) -> Result<(), crate::Error>;

    /// Whether `addr` is assigned to `ifc`
    fn is_local_address(&self, ifc: InterfaceId, addr: &Ipv6Addr) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multicast_request_targets_solicited_node_group() {
        let target: Ipv6Addr = "fe80::aa:bbcc:ddee".parse().unwrap();
        let request = SolicitationRequest::multicast(target);

        assert!(request.is_multicast());
        assert_eq!(request.destination, "ff02::1:ffcc:ddee".parse::<Ipv6Addr>().unwrap());
        assert_eq!(request.target, target);
    }

    #[test]
    fn unicast_request_carries_link_addr() {
        let target: Ipv6Addr = "fe80::1".parse().unwrap();
        let mac = LinkAddr([0x02, 0, 0, 0, 0, 1]);
        let request = SolicitationRequest::unicast(target, mac);

        assert!(!request.is_multicast());
        assert_eq!(request.destination, target);
        assert_eq!(request.link_addr, Some(mac));
    }
}
