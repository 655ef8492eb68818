// # Change Notifier Trait
//
// Optional callout used by stacks that mirror the neighbor table elsewhere
// (a forwarding plane, a management database, a test harness).

use async_trait::async_trait;
use std::net::Ipv6Addr;

use crate::types::{InterfaceId, LinkAddr};

/// Receives committed IP → link-layer mapping changes
///
/// Called only after the cache's exclusive region is released, with values
/// copied out of the table. `valid = false` reports a removal, including an
/// entry evicted to make room for another; that event always precedes the new
/// entry's own `valid = true` event.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn neighbor_changed(&self, ifc: InterfaceId, ip: Ipv6Addr, link_addr: LinkAddr, valid: bool);
}
